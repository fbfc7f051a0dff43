//! Registry configuration.

use crate::dma::DmaDirection;
use crate::heap::SramWindow;

/// Configuration for a [`BufferRegistry`](crate::registry::BufferRegistry)
/// instance.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Diagnostic label carried in tracing events and metric labels.
    pub name: String,
    /// On-chip SRAM window used for heap classification.
    pub sram: SramWindow,
    /// DMA direction requested for every mapping.
    pub direction: DmaDirection,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "pinax".to_string(),
            sram: SramWindow::empty(),
            direction: DmaDirection::Bidirectional,
        }
    }
}

impl RegistryConfig {
    /// Create a config with a diagnostic name and defaults otherwise.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the on-chip SRAM window.
    pub fn with_sram(mut self, sram: SramWindow) -> Self {
        self.sram = sram;
        self
    }

    /// Set the mapping direction.
    ///
    /// The registry's own consumers always map bidirectionally; this knob
    /// exists for embedders that share the mapper with read- or write-only
    /// paths.
    pub fn with_direction(mut self, direction: DmaDirection) -> Self {
        self.direction = direction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert!(config.sram.is_empty());
        assert_eq!(config.direction, DmaDirection::Bidirectional);
    }

    #[test]
    fn test_builder_style_setters() {
        let config = RegistryConfig::named("npu0")
            .with_sram(SramWindow::new(0x4000_0000, 0x10_0000))
            .with_direction(DmaDirection::ToDevice);

        assert_eq!(config.name, "npu0");
        assert!(config.sram.contains(0x4000_0000));
        assert_eq!(config.direction, DmaDirection::ToDevice);
    }
}
