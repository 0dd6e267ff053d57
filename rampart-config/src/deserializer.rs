pub mod uppercase {
    use serde::de::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(value.trim().to_uppercase())
    }
}

pub mod lowercase_key {
    use serde::de::{Deserialize, Deserializer};
    use std::collections::BTreeMap;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = BTreeMap::<String, f64>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect())
    }
}
