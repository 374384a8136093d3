//! Condition groups (AND/OR trees of conditions)

use audience_common::EntityId;
use serde::{Deserialize, Serialize};

use super::condition::{Condition, ConditionDocument, ConditionError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    #[default]
    And,
    Or,
}

/// Boolean combination of conditions and nested groups
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub id: EntityId,
    pub operator: GroupOperator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ConditionGroup>,
}

impl ConditionGroup {
    pub fn new(operator: GroupOperator) -> Self {
        Self {
            id: EntityId::new(),
            operator,
            conditions: vec![],
            groups: vec![],
        }
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            ..Self::new(GroupOperator::And)
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            ..Self::new(GroupOperator::Or)
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// No conditions and no sub-groups
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }

    /// Conditions across the whole tree
    pub fn condition_count(&self) -> usize {
        self.conditions.len() + self.groups.iter().map(|g| g.condition_count()).sum::<usize>()
    }

    /// Nesting depth; a flat group has depth 1
    pub fn depth(&self) -> usize {
        1 + self.groups.iter().map(|g| g.depth()).max().unwrap_or(0)
    }
}

impl Default for ConditionGroup {
    fn default() -> Self {
        Self::new(GroupOperator::And)
    }
}

/// Group of untyped condition documents, as imported from older definitions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LooseConditionGroup {
    #[serde(default)]
    pub operator: GroupOperator,
    #[serde(default)]
    pub conditions: Vec<ConditionDocument>,
    #[serde(default)]
    pub groups: Vec<LooseConditionGroup>,
}

impl LooseConditionGroup {
    /// Strict conversion: the first invalid document aborts
    pub fn into_group(self, delimiter: char) -> Result<ConditionGroup, ConditionError> {
        let conditions = self
            .conditions
            .into_iter()
            .map(|doc| doc.into_condition(delimiter))
            .collect::<Result<Vec<_>, _>>()?;
        let groups = self
            .groups
            .into_iter()
            .map(|g| g.into_group(delimiter))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConditionGroup {
            conditions,
            groups,
            ..ConditionGroup::new(self.operator)
        })
    }
}
