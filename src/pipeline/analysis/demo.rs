//! Fixed demonstration records. Both are labelled "(Demo Mode)" in the name
//! so they can never pass for a real analysis.

use crate::models::MedicineRecord;

pub const DEMO_LABEL: &str = "(Demo Mode)";

/// Shown when a backend credential is missing and the policy allows demo data.
pub fn placeholder_record() -> MedicineRecord {
    MedicineRecord {
        name: format!("Sample Medicine {DEMO_LABEL}"),
        description: "This is a placeholder result since the analysis backend is not configured."
            .into(),
        ingredients: vec!["Demo Ingredient 1".into(), "Demo Ingredient 2".into()],
        price: "$10-15".into(),
        availability: "Available at most pharmacies".into(),
        precautions: vec![
            "Keep out of reach of children".into(),
            "Store in a cool, dry place".into(),
        ],
        alternatives: Some(vec![
            "Alternative Medicine A".into(),
            "Alternative Medicine B".into(),
        ]),
    }
}

/// Substituted for a failed analysis when the failure policy is `UseDemoData`.
pub fn fallback_record() -> MedicineRecord {
    MedicineRecord {
        name: format!("Acetaminophen 500mg {DEMO_LABEL}"),
        description:
            "Pain reliever and fever reducer for temporary relief of minor aches and pains.".into(),
        ingredients: vec![
            "Acetaminophen 500mg (active ingredient)".into(),
            "Corn starch".into(),
            "Hypromellose".into(),
            "Povidone".into(),
            "Stearic acid".into(),
        ],
        price: "$8.99 - $12.49".into(),
        availability: "Available in most pharmacies".into(),
        precautions: vec![
            "Do not use with other medicines containing acetaminophen".into(),
            "Do not take more than directed (max 4000mg daily)".into(),
            "Alcohol warning: May cause liver damage".into(),
            "Consult a doctor if symptoms persist".into(),
        ],
        alternatives: Some(vec![
            "Ibuprofen 200mg".into(),
            "Aspirin 325mg".into(),
            "Naproxen Sodium 220mg".into(),
        ]),
    }
}

#[cfg(test)]
pub(crate) fn is_demo(record: &MedicineRecord) -> bool {
    record.name.ends_with(DEMO_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_records_are_labelled() {
        assert!(is_demo(&placeholder_record()));
        assert!(is_demo(&fallback_record()));
    }

    #[test]
    fn demo_records_satisfy_record_invariants() {
        for record in [placeholder_record(), fallback_record()] {
            assert!(!record.description.is_empty());
            assert!(!record.ingredients.is_empty());
            assert!(!record.precautions.is_empty());
            assert!(record.has_alternatives());
        }
    }
}
