//! Engine configuration.

/// Default number of VM instructions between termination checks.
pub const DEFAULT_INSTRUCTION_HOOK_INTERVAL: u32 = 1000;

/// Default positional-argument ceiling for event handlers: the primary
/// payload plus up to nine auxiliary payloads.
pub const DEFAULT_MAX_HANDLER_ARGUMENTS: usize = 10;

/// Options applied to every engine instance a host creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Allocation ceiling for the whole instance, in bytes. `None` is unlimited.
    pub memory_limit: Option<usize>,

    /// VM instructions executed between two termination checks. Lower values
    /// react faster to termination requests at a small throughput cost.
    pub instruction_hook_interval: u32,

    /// Maximum number of positional arguments passed to an event handler.
    pub max_handler_arguments: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            memory_limit: None,
            instruction_hook_interval: DEFAULT_INSTRUCTION_HOOK_INTERVAL,
            max_handler_arguments: DEFAULT_MAX_HANDLER_ARGUMENTS,
        }
    }
}

impl EngineOptions {
    /// Merge the fields set in `other` into these options.
    pub fn override_with(&mut self, other: &EngineOptionsOverride) {
        if let Some(limit) = other.memory_limit {
            self.memory_limit = Some(limit);
        }
        if let Some(interval) = other.instruction_hook_interval {
            // Zero would disable the hook and with it termination.
            self.instruction_hook_interval = interval.max(1);
        }
        if let Some(max) = other.max_handler_arguments {
            self.max_handler_arguments = max.max(1);
        }
    }
}

/// Partial [`EngineOptions`]; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOptionsOverride {
    pub memory_limit: Option<usize>,
    pub instruction_hook_interval: Option<u32>,
    pub max_handler_arguments: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn override_keeps_unset_fields() {
        let mut options = EngineOptions::default();
        options.override_with(&EngineOptionsOverride {
            memory_limit: Some(1 << 20),
            ..Default::default()
        });

        assert_eq!(
            options,
            EngineOptions {
                memory_limit: Some(1 << 20),
                instruction_hook_interval: DEFAULT_INSTRUCTION_HOOK_INTERVAL,
                max_handler_arguments: DEFAULT_MAX_HANDLER_ARGUMENTS,
            }
        );
    }

    #[test]
    fn override_clamps_zero_values() {
        let mut options = EngineOptions::default();
        options.override_with(&EngineOptionsOverride {
            instruction_hook_interval: Some(0),
            max_handler_arguments: Some(0),
            ..Default::default()
        });

        assert_eq!(options.instruction_hook_interval, 1);
        assert_eq!(options.max_handler_arguments, 1);
    }
}
