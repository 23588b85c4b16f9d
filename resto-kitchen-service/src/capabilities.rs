use std::collections::HashSet;

use resto_core::models::OrderType;

/// Which order types a worker will cook. "No restriction" is its own
/// variant rather than a magic empty set, so the two cases cannot be
/// confused at call sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Capabilities {
    Unrestricted,
    Restricted(HashSet<OrderType>),
}

impl Capabilities {
    /// Parses the `--order-types` flag: a comma-separated list, or empty for
    /// a general worker that accepts everything.
    pub fn parse_list(raw: &str) -> Result<Self, String> {
        let parts: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            return Ok(Capabilities::Unrestricted);
        }

        let mut types = HashSet::new();
        for part in parts {
            types.insert(part.parse::<OrderType>()?);
        }
        Ok(Capabilities::Restricted(types))
    }

    pub fn accepts(&self, order_type: OrderType) -> bool {
        match self {
            Capabilities::Unrestricted => true,
            Capabilities::Restricted(types) => types.contains(&order_type),
        }
    }

    /// Derived worker type stored on the worker row.
    pub fn worker_type(&self) -> &'static str {
        match self {
            Capabilities::Unrestricted => "general",
            Capabilities::Restricted(_) => "specialized",
        }
    }

    /// Topic-exchange binding keys matching `kitchen.<type>.<priority>`.
    pub fn binding_keys(&self) -> Vec<String> {
        match self {
            Capabilities::Unrestricted => vec!["kitchen.#".to_string()],
            Capabilities::Restricted(types) => {
                let mut keys: Vec<String> =
                    types.iter().map(|t| format!("kitchen.{}.*", t)).collect();
                keys.sort();
                keys
            }
        }
    }

    /// Capability set as stored in the worker row; empty means unrestricted.
    pub fn as_strings(&self) -> Vec<String> {
        match self {
            Capabilities::Unrestricted => vec![],
            Capabilities::Restricted(types) => {
                let mut names: Vec<String> =
                    types.iter().map(|t| t.as_str().to_string()).collect();
                names.sort();
                names
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_flag_means_unrestricted() {
        let caps = Capabilities::parse_list("").unwrap();
        assert_eq!(caps, Capabilities::Unrestricted);
        assert!(caps.accepts(OrderType::DineIn));
        assert!(caps.accepts(OrderType::Takeout));
        assert!(caps.accepts(OrderType::Delivery));
        assert_eq!(caps.worker_type(), "general");
        assert_eq!(caps.binding_keys(), vec!["kitchen.#"]);
        assert!(caps.as_strings().is_empty());
    }

    #[test]
    fn restricted_set_only_accepts_listed_types() {
        let caps = Capabilities::parse_list("delivery, takeout").unwrap();
        assert!(caps.accepts(OrderType::Delivery));
        assert!(caps.accepts(OrderType::Takeout));
        assert!(!caps.accepts(OrderType::DineIn));
        assert_eq!(caps.worker_type(), "specialized");
        assert_eq!(
            caps.binding_keys(),
            vec!["kitchen.delivery.*", "kitchen.takeout.*"]
        );
        assert_eq!(caps.as_strings(), vec!["delivery", "takeout"]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(Capabilities::parse_list("takeout,drive_thru").is_err());
    }
}
