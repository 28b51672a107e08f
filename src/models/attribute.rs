// src/models/attribute.rs
//! Attribute schemas and the typed subjects produced by proof intake.
//!
//! A [`Schema`] is an explicit, versioned, ordered key list. The order is the
//! order fields are committed in and the order a holder sees them; it is never
//! inferred from map iteration.

use crate::error::InputValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Collection name used to namespace offer records: `offerAc[<index>].<key>`.
pub const OFFER_COLLECTION: &str = "offerAc";

/// A single credential fact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// Versioned, ordered list of keys a credential section must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub id: &'static str,
    pub keys: &'static [&'static str],
}

/// Identity fields disclosed by the passport proof.
pub const IDENTITY_SCHEMA: Schema = Schema {
    id: "zkaccess-identity/v1",
    keys: &[
        "firstname",
        "lastname",
        "birthdate",
        "nationality",
        "documentType",
        "documentNumber",
    ],
};

/// One employment offer extracted from a verified email.
pub const OFFER_SCHEMA: Schema = Schema {
    id: "zkaccess-offer/v1",
    keys: &[
        "emailRecipient",
        "emailSender",
        "emailTimestamp",
        "offer",
        "currency",
        "company",
    ],
};

impl Schema {
    /// Looks a schema up by id or short name (`identity`, `offer`).
    pub fn by_name(name: &str) -> Option<Schema> {
        let short = format!("zkaccess-{}", name);
        [IDENTITY_SCHEMA, OFFER_SCHEMA]
            .into_iter()
            .find(|s| s.id == name || s.id.split('/').next() == Some(short.as_str()))
    }
}

/// Text form of a scalar JSON value: strings verbatim, numbers and booleans
/// stringified once. `null` is `None`.
///
/// # Errors
/// `NonScalarValue(key)` for arrays and objects.
pub fn scalar_text(key: &str, value: &Value) -> Result<Option<String>, InputValidationError> {
    match value {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Null => Ok(None),
        Value::Array(_) | Value::Object(_) => {
            Err(InputValidationError::NonScalarValue(key.to_string()))
        }
    }
}

/// Identity fields disclosed by the passport proof.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySubject {
    pub firstname: String,
    pub lastname: String,
    pub birthdate: String,
    pub nationality: String,
    pub document_type: String,
    pub document_number: String,
}

impl IdentitySubject {
    /// Reads the disclosed passport fields from a loosely-typed proof object.
    ///
    /// Every [`IDENTITY_SCHEMA`] key must be present and scalar; numbers and
    /// booleans are stringified. Other keys are ignored.
    ///
    /// # Errors
    /// - `MissingRequiredField` for an absent or `null` key
    /// - `NonScalarValue` for an array or object value
    pub fn from_disclosure(object: &Map<String, Value>) -> Result<Self, InputValidationError> {
        let field = |key: &str| -> Result<String, InputValidationError> {
            let value = object
                .get(key)
                .ok_or_else(|| InputValidationError::MissingRequiredField(key.to_string()))?;
            scalar_text(key, value)?
                .ok_or_else(|| InputValidationError::MissingRequiredField(key.to_string()))
        };
        Ok(IdentitySubject {
            firstname: field("firstname")?,
            lastname: field("lastname")?,
            birthdate: field("birthdate")?,
            nationality: field("nationality")?,
            document_type: field("documentType")?,
            document_number: field("documentNumber")?,
        })
    }

    fn values(&self) -> BTreeMap<String, String> {
        [
            ("firstname", &self.firstname),
            ("lastname", &self.lastname),
            ("birthdate", &self.birthdate),
            ("nationality", &self.nationality),
            ("documentType", &self.document_type),
            ("documentNumber", &self.document_number),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

/// One offer email, in verification order.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OfferRecord {
    pub index: usize,
    pub email_sender: String,
    pub offer: String,
    pub currency: String,
    pub company: String,
    pub email_recipient: String,
    /// Capture time in unix seconds unless the proof carried its own timestamp.
    pub email_timestamp: String,
}

impl OfferRecord {
    fn values(&self) -> BTreeMap<String, String> {
        [
            ("emailRecipient", &self.email_recipient),
            ("emailSender", &self.email_sender),
            ("emailTimestamp", &self.email_timestamp),
            ("offer", &self.offer),
            ("currency", &self.currency),
            ("company", &self.company),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EmploymentOfferSubject {
    pub offers: Vec<OfferRecord>,
}

/// Well-known subject shapes resolved at the intake boundary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "schema", rename_all = "camelCase")]
pub enum SubjectVariant {
    Identity(IdentitySubject),
    EmploymentOffer(EmploymentOfferSubject),
}

/// Merged intake result, ready for binding.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSubject {
    pub variants: Vec<SubjectVariant>,
}

impl CandidateSubject {
    /// Flattens the variants into schema-checked field groups, in variant order.
    pub fn field_groups(&self) -> Vec<FieldGroup> {
        let mut groups = Vec::new();
        for variant in &self.variants {
            match variant {
                SubjectVariant::Identity(identity) => {
                    groups.push(FieldGroup::root(IDENTITY_SCHEMA, identity.values()));
                }
                SubjectVariant::EmploymentOffer(subject) => {
                    for offer in &subject.offers {
                        groups.push(FieldGroup::indexed(
                            OFFER_COLLECTION,
                            offer.index,
                            OFFER_SCHEMA,
                            offer.values(),
                        ));
                    }
                }
            }
        }
        groups
    }
}

/// Raw values for one schema section, optionally namespaced under a collection index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    pub prefix: Option<String>,
    pub schema: Schema,
    pub values: BTreeMap<String, String>,
}

impl FieldGroup {
    pub fn root(schema: Schema, values: BTreeMap<String, String>) -> Self {
        FieldGroup { prefix: None, schema, values }
    }

    pub fn indexed(
        collection: &str,
        index: usize,
        schema: Schema,
        values: BTreeMap<String, String>,
    ) -> Self {
        FieldGroup {
            prefix: Some(format!("{}[{}]", collection, index)),
            schema,
            values,
        }
    }

    /// Full path of `key` inside the credential subject; also the hashed key.
    pub fn path(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_follow_schema_and_offer_order() {
        let candidate = CandidateSubject {
            variants: vec![
                SubjectVariant::Identity(IdentitySubject {
                    firstname: "John".into(),
                    ..Default::default()
                }),
                SubjectVariant::EmploymentOffer(EmploymentOfferSubject {
                    offers: vec![
                        OfferRecord {
                            index: 0,
                            offer: "1000000".into(),
                            ..Default::default()
                        },
                        OfferRecord {
                            index: 1,
                            offer: "2000000".into(),
                            ..Default::default()
                        },
                    ],
                }),
            ],
        };

        let groups = candidate.field_groups();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].prefix, None);
        assert_eq!(groups[0].values["firstname"], "John");
        assert_eq!(groups[1].path("offer"), "offerAc[0].offer");
        assert_eq!(groups[2].path("offer"), "offerAc[1].offer");
        assert_eq!(groups[2].values["offer"], "2000000");
        for group in &groups {
            for key in group.schema.keys {
                assert!(group.values.contains_key(*key));
            }
        }
    }

    #[test]
    fn schema_lookup_by_short_name() {
        assert_eq!(Schema::by_name("identity"), Some(IDENTITY_SCHEMA));
        assert_eq!(Schema::by_name("zkaccess-offer/v1"), Some(OFFER_SCHEMA));
        assert_eq!(Schema::by_name("passport"), None);
    }

    fn disclosure(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn disclosure_accepts_numeric_scalars() {
        let identity = IdentitySubject::from_disclosure(&disclosure(serde_json::json!({
            "firstname": "John",
            "lastname": "Doe",
            "birthdate": 19900101,
            "nationality": "ARG",
            "documentType": "passport",
            "documentNumber": "AA123456",
            "issuingState": "ARG"
        })))
        .unwrap();
        assert_eq!(identity.birthdate, "19900101");
        assert_eq!(identity.document_type, "passport");
    }

    #[test]
    fn disclosure_names_missing_and_nested_fields() {
        let missing = disclosure(serde_json::json!({
            "firstname": "John", "lastname": "Doe", "birthdate": "19900101",
            "nationality": "ARG", "documentNumber": "AA123456"
        }));
        let err = IdentitySubject::from_disclosure(&missing).unwrap_err();
        assert_eq!(err, InputValidationError::MissingRequiredField("documentType".into()));

        let mut null = missing.clone();
        null.insert("documentType".into(), Value::Null);
        let err = IdentitySubject::from_disclosure(&null).unwrap_err();
        assert_eq!(err.field(), Some("documentType"));

        let mut nested = missing;
        nested.insert("documentType".into(), serde_json::json!(["passport"]));
        let err = IdentitySubject::from_disclosure(&nested).unwrap_err();
        assert_eq!(err, InputValidationError::NonScalarValue("documentType".into()));
    }

    #[test]
    fn variants_are_tagged_on_the_wire() {
        let identity = SubjectVariant::Identity(IdentitySubject::default());
        let json = serde_json::to_value(identity).unwrap();
        assert_eq!(json["schema"], "identity");
        assert_eq!(json["documentType"], "");
    }
}
