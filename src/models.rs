//! Domain records mirrored from the relational store
//!
//! Every list-bearing field (`tags`, `items`) deserializes to a well-formed
//! array even when the backing value is null, missing, or malformed; the
//! stores never see the raw shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A stored business contact, owned by the user who created it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub company: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Non-string entries in the backing value are dropped on load
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub tags: Vec<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A quote, as exposed by the stores
///
/// `marche_sector` and `marche_end_date` are denormalized from the joined
/// `marches` relation when the quote is fetched through the authored view;
/// they stay `None` on the received view, which performs no join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Devis {
    pub id: String,
    pub marche_id: Option<String>,
    pub marche_title: Option<String>,
    pub company: String,
    pub location: Option<String>,
    /// Open string vocabulary: Accepté / En attente / Refusé / Brouillon / other
    pub status: String,
    pub total_ht: Option<f64>,
    pub tva: Option<f64>,
    pub total_ttc: Option<f64>,
    /// Free-form line items; a non-array backing value loads as empty
    pub items: Vec<serde_json::Value>,
    pub comment: Option<String>,
    pub created_by: String,
    pub sent_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub marche_sector: Option<String>,
    pub marche_end_date: Option<NaiveDate>,
}

/// Wire shape of a `devis` row, including the optional embedded relation
#[derive(Debug, Clone, Deserialize)]
pub struct DevisRecord {
    pub id: String,
    #[serde(default)]
    pub marche_id: Option<String>,
    #[serde(default)]
    pub marche_title: Option<String>,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    pub status: String,
    #[serde(default)]
    pub total_ht: Option<f64>,
    #[serde(default)]
    pub tva: Option<f64>,
    #[serde(default)]
    pub total_ttc: Option<f64>,
    #[serde(default, deserialize_with = "lenient_value_list")]
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub sent_to: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub marches: Option<MarcheEmbed>,
}

/// Projection of the `marches` relation embedded in an authored-devis read
#[derive(Debug, Clone, Deserialize)]
pub struct MarcheEmbed {
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl From<DevisRecord> for Devis {
    fn from(record: DevisRecord) -> Self {
        let (marche_sector, marche_end_date) = match record.marches {
            Some(embed) => (embed.sector, embed.end_date),
            None => (None, None),
        };

        Devis {
            id: record.id,
            marche_id: record.marche_id,
            marche_title: record.marche_title,
            company: record.company,
            location: record.location,
            status: record.status,
            total_ht: record.total_ht,
            tva: record.tva,
            total_ttc: record.total_ttc,
            items: record.items,
            comment: record.comment,
            created_by: record.created_by,
            sent_to: record.sent_to,
            created_at: record.created_at,
            updated_at: record.updated_at,
            marche_sector,
            marche_end_date,
        }
    }
}

/// The `marches` projection consumed by the project-metadata aggregate
#[derive(Debug, Clone, Deserialize)]
pub struct MarcheRow {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Derived, client-computed aggregate: one record per distinct `project_id`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectMetadata {
    pub project_id: String,
    /// Distinct sectors, in first-insertion order
    pub sectors: Vec<String>,
    /// Distinct locations, in first-insertion order
    pub locations: Vec<String>,
    /// Number of marché rows in the group
    pub ao_count: usize,
}

/// A user-facing alert record with read/unread state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a new notification row
#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: Option<String>,
    pub read: bool,
}

/// Coerce a backing value into a list of strings, dropping anything else
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                serde_json::Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Coerce a backing value into a list, treating anything non-array as empty
fn lenient_value_list<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Array(entries)) => entries,
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact_json(tags: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "c1",
            "company": "Acme BTP",
            "name": "Jeanne Dupont",
            "tags": tags,
            "created_by": "u1",
            "created_at": "2024-03-12T09:30:00Z"
        })
    }

    #[test]
    fn tags_null_becomes_empty() {
        let contact: Contact = serde_json::from_value(contact_json(json!(null))).unwrap();
        assert!(contact.tags.is_empty());
    }

    #[test]
    fn tags_missing_becomes_empty() {
        let mut value = contact_json(json!([]));
        value.as_object_mut().unwrap().remove("tags");
        let contact: Contact = serde_json::from_value(value).unwrap();
        assert!(contact.tags.is_empty());
    }

    #[test]
    fn tags_non_array_becomes_empty() {
        let contact: Contact = serde_json::from_value(contact_json(json!("fournisseur"))).unwrap();
        assert!(contact.tags.is_empty());
    }

    #[test]
    fn tags_drop_non_string_entries() {
        let contact: Contact =
            serde_json::from_value(contact_json(json!(["btp", 42, null, "urgent"]))).unwrap();
        assert_eq!(contact.tags, vec!["btp".to_string(), "urgent".to_string()]);
    }

    #[test]
    fn items_non_array_becomes_empty() {
        let devis: DevisRecord = serde_json::from_value(json!({
            "id": "d1",
            "company": "Acme BTP",
            "status": "Brouillon",
            "items": "corrupted",
            "created_by": "u1",
            "created_at": "2024-03-12T09:30:00Z"
        }))
        .unwrap();
        assert!(devis.items.is_empty());
    }

    #[test]
    fn devis_record_flattens_embedded_marche() {
        let record: DevisRecord = serde_json::from_value(json!({
            "id": "d1",
            "marche_id": "m1",
            "marche_title": "Rénovation école",
            "company": "Acme BTP",
            "status": "En attente",
            "items": [{"label": "Gros œuvre", "amount": 12000}],
            "created_by": "u1",
            "sent_to": "u2",
            "created_at": "2024-03-12T09:30:00Z",
            "marches": {"sector": "BTP", "end_date": "2024-06-30"}
        }))
        .unwrap();

        let devis = Devis::from(record);
        assert_eq!(devis.marche_sector.as_deref(), Some("BTP"));
        assert_eq!(
            devis.marche_end_date,
            NaiveDate::from_ymd_opt(2024, 6, 30)
        );
        assert_eq!(devis.items.len(), 1);
    }

    #[test]
    fn devis_without_join_has_no_denormalized_fields() {
        let record: DevisRecord = serde_json::from_value(json!({
            "id": "d2",
            "company": "Acme BTP",
            "status": "Accepté",
            "created_by": "u1",
            "created_at": "2024-03-12T09:30:00Z"
        }))
        .unwrap();

        let devis = Devis::from(record);
        assert!(devis.marche_sector.is_none());
        assert!(devis.marche_end_date.is_none());
        assert!(devis.items.is_empty());
    }
}
