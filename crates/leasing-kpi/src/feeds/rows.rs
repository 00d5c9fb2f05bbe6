use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Reads any scalar cell as text. Exports disagree on whether dates and amounts are
/// strings or numbers, so both are kept verbatim and parsed later by the normalizer.
/// Blank strings, nulls, arrays and objects become `None`.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        _ => None,
    })
}

macro_rules! feed_row {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$field_meta:meta])* $field:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, serde::Serialize)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
                pub $field: Option<String>,
            )*
        }
    };
}

feed_row! {
    /// Pre-aggregated leasing velocity, one row per property per report date.
    pub struct LeasingRow {
        property,
        report_date,
        total_units,
        leases_7d,
        leases_28d,
        new_leases_7d,
        new_leases_28d,
        renewals_7d,
        renewals_28d,
        occupancy_pct,
        leased_pct,
    }
}

feed_row! {
    /// Weekly summary report row, carrying the budget figures and the property status.
    pub struct WeeklySummaryRow {
        property,
        report_date,
        total_units,
        occupied_units,
        occupancy_pct,
        leased_pct,
        budgeted_occupancy_pct,
        budgeted_occupied_units,
        budgeted_leased_pct,
        average_leased_rent,
        status,
    }
}

feed_row! {
    /// One renewed or replaced lease with the rent before and after.
    pub struct TradeOutRow {
        property,
        unit,
        floor_plan,
        lease_start,
        report_date,
        prior_rent,
        new_rent,
        lease_type,
    }
}

feed_row! {
    /// Per-unit status snapshot. Several rows may describe the same unit on the same
    /// report date (resident row and applicant row, for example).
    pub struct UnitDetailRow {
        property,
        unit_number,
        unit_designation,
        floor_plan,
        lease_status,
        lease_type,
        notice_date,
        move_in_date,
        move_out_date,
        lease_start,
        lease_end,
        application_signed,
        lease_signed,
        application_date,
        rent,
        effective_rent,
        report_date,
        /// Secondary snapshot date some extracts carry next to `report_date`.
        as_of_date,
    }
}

feed_row! {
    /// Physical unit inventory.
    pub struct UnitRow {
        property,
        unit,
        floor_plan,
        bedrooms,
        bathrooms,
        square_feet,
        market_rent,
    }
}

feed_row! {
    /// Pre-aggregated occupancy per floor plan.
    pub struct UnitMixRow {
        property,
        floor_plan,
        report_date,
        total_units,
        occupancy_pct,
        leased_pct,
        average_rent,
    }
}

feed_row! {
    pub struct PricingRow {
        property,
        floor_plan,
        date,
        asking_rent,
        effective_rent,
    }
}

feed_row! {
    pub struct RecentLeaseRow {
        property,
        unit,
        floor_plan,
        signed_date,
        lease_start,
        rent,
        lease_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_fields_accept_numbers_strings_and_blanks() {
        let row: UnitDetailRow = serde_json::from_value(serde_json::json!({
            "property": "Oak Park",
            "unit_number": 101,
            "rent": 1250.5,
            "lease_status": "   ",
            "notice_date": null,
            "move_in_date": ["not", "scalar"],
            "unknown_column": "ignored"
        }))
        .expect("row parses");

        assert_eq!(row.property.as_deref(), Some("Oak Park"));
        assert_eq!(row.unit_number.as_deref(), Some("101"));
        assert_eq!(row.rent.as_deref(), Some("1250.5"));
        assert!(row.lease_status.is_none());
        assert!(row.notice_date.is_none());
        assert!(row.move_in_date.is_none());
        assert!(row.report_date.is_none());
    }

    #[test]
    fn serializes_only_present_fields() {
        let row = PricingRow {
            property: Some("Elm".to_string()),
            asking_rent: Some("1400".to_string()),
            ..PricingRow::default()
        };
        let value = serde_json::to_value(&row).expect("serialize");
        assert_eq!(value, serde_json::json!({"property": "Elm", "asking_rent": "1400"}));
    }
}
