//! Grouping of records by (market, CapEx type).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::{Measure, Measures, Record};

/// Name of the user-editable spend override column.
pub const USER_INPUT_SPEND: &str = "User_Input_Spend";

/// Name of the derived projected spend column.
pub const UPDATED_PROJECTED_SPEND: &str = "Updated_Projected_Spend";

/// Aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub market: String,
    pub capex_type: String,
}

impl GroupKey {
    pub fn new(market: impl Into<String>, capex_type: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            capex_type: capex_type.into(),
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.market, self.capex_type)
    }
}

/// Summed measures for one (market, CapEx type) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: GroupKey,
    pub measures: Measures,
    /// Number of records folded into this group
    pub record_count: usize,
    user_input_spend: f64,
    predicted_roi: Option<f64>,
}

impl Group {
    fn new(key: GroupKey) -> Self {
        Self {
            key,
            measures: Measures::default(),
            record_count: 0,
            user_input_spend: 0.0,
            predicted_roi: None,
        }
    }

    pub fn market(&self) -> &str {
        &self.key.market
    }

    pub fn capex_type(&self) -> &str {
        &self.key.capex_type
    }

    pub fn user_input_spend(&self) -> f64 {
        self.user_input_spend
    }

    /// Override the user spend. `updated_projected_spend` follows immediately;
    /// `predicted_roi` is left as scored.
    pub fn set_user_input_spend(&mut self, spend: f64) {
        self.user_input_spend = spend;
    }

    /// Projected spend plus the user override, computed on every read.
    pub fn updated_projected_spend(&self) -> f64 {
        self.measures.projected_spend + self.user_input_spend
    }

    pub fn predicted_roi(&self) -> Option<f64> {
        self.predicted_roi
    }

    pub(crate) fn set_predicted_roi(&mut self, roi: f64) {
        self.predicted_roi = Some(roi);
    }

    /// Look up a named numeric field the way a feature builder sees the group.
    ///
    /// Covers the nine measure columns plus the two spend columns; anything
    /// else is absent.
    pub fn field(&self, name: &str) -> Option<f64> {
        if let Some(measure) = Measure::from_column(name) {
            return Some(self.measures.get(measure));
        }
        match name {
            USER_INPUT_SPEND => Some(self.user_input_spend),
            UPDATED_PROJECTED_SPEND => Some(self.updated_projected_spend()),
            _ => None,
        }
    }
}

/// Fold records into groups, one per distinct key, in first-seen key order.
pub fn aggregate(records: &[Record]) -> Vec<Group> {
    let mut positions: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for record in records {
        let key = GroupKey::new(record.market.as_str(), record.capex_type.as_str());
        let idx = *positions.entry(key.clone()).or_insert_with(|| {
            groups.push(Group::new(key));
            groups.len() - 1
        });

        let group = &mut groups[idx];
        group.measures += record.measures;
        group.record_count += 1;
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn record(market: &str, capex_type: &str, historical: f64, projected: f64) -> Record {
        let mut values = [1.0; 9];
        values[0] = historical;
        values[1] = projected;
        Record::new(market, capex_type, Measures::from_values(values))
    }

    #[test]
    fn test_two_groups_from_three_records() {
        let records = vec![
            record("M1", "A", 10.0, 20.0),
            record("M1", "A", 5.0, 8.0),
            record("M2", "B", 3.0, 4.0),
        ];

        let groups = aggregate(&records);
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].key, GroupKey::new("M1", "A"));
        assert_eq!(groups[0].measures.historical_spend, 15.0);
        assert_eq!(groups[0].measures.projected_spend, 28.0);
        assert_eq!(groups[0].measures.margin_impact, 2.0);
        assert_eq!(groups[0].record_count, 2);

        assert_eq!(groups[1].key, GroupKey::new("M2", "B"));
        assert_eq!(groups[1].measures.historical_spend, 3.0);
        assert_eq!(groups[1].measures.projected_spend, 4.0);
        assert_eq!(groups[1].record_count, 1);
    }

    #[test]
    fn test_first_seen_order() {
        let records = vec![
            record("Spain", "IT", 1.0, 1.0),
            record("France", "IT", 1.0, 1.0),
            record("Spain", "Network", 1.0, 1.0),
            record("France", "IT", 1.0, 1.0),
        ];
        let keys: Vec<String> = aggregate(&records).iter().map(|g| g.key.to_string()).collect();
        assert_eq!(keys, vec!["Spain/IT", "France/IT", "Spain/Network"]);
    }

    #[test]
    fn test_same_market_different_type_are_distinct() {
        let records = vec![record("M1", "A", 1.0, 1.0), record("M1", "B", 1.0, 1.0)];
        assert_eq!(aggregate(&records).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn test_new_group_defaults() {
        let groups = aggregate(&[record("M1", "A", 1.0, 7.5)]);
        let g = &groups[0];
        assert_eq!(g.user_input_spend(), 0.0);
        assert_eq!(g.updated_projected_spend(), 7.5);
        assert!(g.predicted_roi().is_none());
    }

    #[test]
    fn test_edit_updates_derived_spend_only() {
        let mut groups = aggregate(&[record("M1", "A", 1.0, 10.0)]);
        groups[0].set_predicted_roi(3.25);
        groups[0].set_user_input_spend(2.5);
        assert_eq!(groups[0].updated_projected_spend(), 12.5);
        assert_eq!(groups[0].predicted_roi(), Some(3.25));

        groups[0].set_user_input_spend(-4.0);
        assert_eq!(groups[0].updated_projected_spend(), 6.0);
    }

    #[test]
    fn test_field_lookup() {
        let mut groups = aggregate(&[record("M1", "A", 1.0, 10.0)]);
        groups[0].set_user_input_spend(1.0);
        let g = &groups[0];
        assert_eq!(g.field("Projected_Spend_Million"), Some(10.0));
        assert_eq!(g.field(USER_INPUT_SPEND), Some(1.0));
        assert_eq!(g.field(UPDATED_PROJECTED_SPEND), Some(11.0));
        assert_eq!(g.field("Feature_10"), None);
        assert_eq!(g.field("Encoded_Market"), None);
    }

    fn arb_records() -> impl Strategy<Value = Vec<Record>> {
        let market = prop::sample::select(vec!["M1", "M2", "M3"]);
        let capex_type = prop::sample::select(vec!["A", "B"]);
        let values = prop::array::uniform9(-1_000i32..1_000i32);
        prop::collection::vec((market, capex_type, values), 0..40).prop_map(|rows| {
            rows.into_iter()
                .map(|(m, t, v)| Record::new(m, t, Measures::from_values(v.map(f64::from))))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_keys_unique_and_sums_match(records in arb_records()) {
            let groups = aggregate(&records);

            let keys: HashSet<&GroupKey> = groups.iter().map(|g| &g.key).collect();
            prop_assert_eq!(keys.len(), groups.len());

            for group in &groups {
                let members: Vec<&Record> = records
                    .iter()
                    .filter(|r| r.market == group.key.market && r.capex_type == group.key.capex_type)
                    .collect();
                prop_assert_eq!(members.len(), group.record_count);
                for measure in Measure::ALL {
                    let expected: f64 = members.iter().map(|r| r.measures.get(measure)).sum();
                    prop_assert_eq!(group.measures.get(measure), expected);
                }
            }
        }

        #[test]
        fn prop_updated_spend_tracks_edits(
            records in arb_records(),
            edits in prop::collection::vec((0usize..8, -500i32..500i32), 0..20),
        ) {
            let mut groups = aggregate(&records);
            if groups.is_empty() {
                return Ok(());
            }
            for (idx, spend) in edits {
                let n = groups.len();
                groups[idx % n].set_user_input_spend(f64::from(spend));
            }
            for g in &groups {
                prop_assert_eq!(
                    g.updated_projected_spend(),
                    g.measures.projected_spend + g.user_input_spend()
                );
            }
        }
    }
}
