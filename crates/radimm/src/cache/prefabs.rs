//! # Config Prefabs for Well-Known Model Configurations

use crate::cache::weights::{
    PretrainedWeightsDescriptor, PretrainedWeightsMap, StaticPretrainedWeightsMap,
};
use anyhow::bail;
use burn::config::Config;
use std::fmt::Debug;
use std::sync::Arc;

/// Static builder for a [`PreFabConfig`]
pub struct StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: &'static str,

    /// Description of the model config pre-fab.
    pub description: &'static str,

    /// Builder function for the config.
    pub builder: fn() -> C,

    /// Pretrained weights published for this pre-fab.
    pub weights: Option<&'static StaticPretrainedWeightsMap<'static>>,
}

impl<C> StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Convert to a [`PreFabConfig<C>`].
    pub fn to_prefab(&self) -> PreFabConfig<C> {
        let builder = self.builder;
        PreFabConfig {
            name: self.name.to_string(),
            description: self.description.to_string(),
            builder: Arc::new(builder),
            weights: self.weights.map(|w| w.to_directory()),
        }
    }
}

impl<C> From<&StaticPreFabConfig<C>> for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn from(config: &StaticPreFabConfig<C>) -> Self {
        config.to_prefab()
    }
}

impl<C> Debug for StaticPreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.to_prefab().fmt(f)
    }
}

/// A [`Config`] Well-Known Pre-Fab.
pub struct PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the model config pre-fab.
    pub name: String,

    /// Description of the model config pre-fab.
    pub description: String,

    /// Builder function for the config.
    pub builder: Arc<dyn Fn() -> C + Send + Sync>,

    /// Pretrained weights published for this pre-fab.
    pub weights: Option<PretrainedWeightsMap>,
}

impl<C> Debug for PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let pretty = f.alternate();

        let type_name = std::any::type_name::<C>();
        let mut handle = f.debug_struct(&format!("PreFabConfig<{}>", type_name));

        handle
            .field("name", &self.name)
            .field("description", &self.description)
            .field("weights", &self.weights);

        if pretty {
            handle.field("config", &self.new_config());
        }

        handle.finish()
    }
}

impl<C> PreFabConfig<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Build a new config.
    pub fn new_config(&self) -> C {
        (self.builder)()
    }

    /// Lookup a pretrained weights descriptor by name.
    pub fn lookup_pretrained_weights(
        &self,
        name: &str,
    ) -> Option<PretrainedWeightsDescriptor> {
        self.weights.as_ref().and_then(|w| w.lookup_by_name(name))
    }

    /// Lookup a pretrained weights descriptor by name.
    pub fn try_lookup_pretrained_weights(
        &self,
        name: &str,
    ) -> anyhow::Result<PretrainedWeightsDescriptor> {
        match self.lookup_pretrained_weights(name) {
            Some(d) => Ok(d),
            None => bail!(
                "No pretrained weights {:?} for prefab {:?}",
                name,
                self.name
            ),
        }
    }

    /// Lookup a pretrained weights descriptor by name.
    pub fn expect_lookup_pretrained_weights(
        &self,
        name: &str,
    ) -> PretrainedWeightsDescriptor {
        match self.try_lookup_pretrained_weights(name) {
            Ok(d) => d,
            Err(e) => panic!("{}", e),
        }
    }
}

/// Static directory of [`StaticPreFabConfig`]s.
#[derive(Debug)]
pub struct StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Name of the map.
    pub name: &'static str,

    /// Description of the map.
    pub description: &'static str,

    /// The pre-fabs.
    pub items: &'static [&'static StaticPreFabConfig<C>],
}

impl<C> StaticPreFabMap<C>
where
    C: 'static + Config + Debug + Clone,
{
    /// Lookup a prefab by name.
    pub fn lookup_prefab(
        &self,
        name: &str,
    ) -> Option<PreFabConfig<C>> {
        self.items
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.to_prefab())
    }

    /// Lookup a prefab by name.
    pub fn try_lookup_prefab(
        &self,
        name: &str,
    ) -> anyhow::Result<PreFabConfig<C>> {
        match self.lookup_prefab(name) {
            Some(p) => Ok(p),
            None => bail!("Prefab not found in {:?}: {:?}", self.name, name),
        }
    }

    /// Lookup a prefab by name.
    pub fn expect_lookup_prefab(
        &self,
        name: &str,
    ) -> PreFabConfig<C> {
        match self.try_lookup_prefab(name) {
            Ok(p) => p,
            Err(e) => panic!("{}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::weights::StaticPretrainedWeightsDescriptor;

    #[derive(Config, Debug)]
    struct TestConfig {
        width: usize,
    }

    static TEST_MAP: StaticPreFabMap<TestConfig> = StaticPreFabMap {
        name: "test",
        description: "Test prefabs",

        items: &[&StaticPreFabConfig {
            name: "small",
            description: "A small test config",
            builder: || TestConfig::new(3),

            weights: Some(&StaticPretrainedWeightsMap {
                items: &[&StaticPretrainedWeightsDescriptor {
                    name: "tv_in1k",
                    description: "pretrained on ImageNet",
                    license: None,
                    origin: None,
                    urls: &["https://example.com/weights.pth"],
                }],
            }),
        }],
    };

    #[test]
    fn test_lookup_prefab() {
        let prefab = TEST_MAP.expect_lookup_prefab("small");
        assert_eq!(prefab.name, "small");
        assert_eq!(prefab.new_config().width, 3);

        assert!(TEST_MAP.lookup_prefab("missing").is_none());
        assert!(TEST_MAP.try_lookup_prefab("missing").is_err());
    }

    #[test]
    fn test_lookup_pretrained_weights() {
        let prefab = TEST_MAP.expect_lookup_prefab("small");

        let weights = prefab.expect_lookup_pretrained_weights("tv_in1k");
        assert_eq!(weights.urls, &["https://example.com/weights.pth"]);

        assert!(prefab.try_lookup_pretrained_weights("missing").is_err());
    }

    #[test]
    #[should_panic(expected = "Prefab not found")]
    fn test_expect_lookup_prefab_panics() {
        TEST_MAP.expect_lookup_prefab("missing");
    }
}
