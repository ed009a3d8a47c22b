use serde::{Deserialize, Deserializer, Serializer};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	OffsetDateTime::parse(&raw, &Rfc3339).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
	use serde::{Deserialize, Serialize};
	use time::macros::datetime;

	use super::*;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Stamped {
		#[serde(with = "crate::time_serde")]
		at: OffsetDateTime,
	}

	#[test]
	fn timestamps_round_trip_as_rfc3339() {
		let stamped = Stamped { at: datetime!(2026-08-28 12:34:56 UTC) };
		let json = serde_json::to_string(&stamped).expect("serialize failed");

		assert_eq!(json, r#"{"at":"2026-08-28T12:34:56Z"}"#);
		assert_eq!(serde_json::from_str::<Stamped>(&json).expect("deserialize failed"), stamped);
	}
}
