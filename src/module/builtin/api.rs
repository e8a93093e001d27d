//! API for builtin module registration and discovery
//!
//! Builtin modules use the `builtin_module!` macro to register a factory for
//! automatic discovery.

use crate::host::api::ModuleFactory;
use crate::module::traits::Module;
use std::sync::Arc;

/// Entry for a builtin module in the registry
pub struct BuiltinModuleEntry {
    pub factory: fn() -> Arc<dyn Module>,
}

// Collect all builtin module entries
inventory::collect!(BuiltinModuleEntry);

/// Register a builtin module factory
#[macro_export]
macro_rules! builtin_module {
    ($factory_expr:expr) => {
        inventory::submit!($crate::module::builtin::api::BuiltinModuleEntry {
            factory: $factory_expr
        });
    };
}

/// Construct every registered builtin module, sorted by name
pub fn get_all_builtin_modules() -> Vec<Arc<dyn Module>> {
    let mut modules: Vec<_> = inventory::iter::<BuiltinModuleEntry>()
        .map(|entry| (entry.factory)())
        .collect();
    modules.sort_by_key(|m| m.module_info().name);
    modules
}

/// Factories for the builtin modules not named in `exclude`, sorted by name
pub fn builtin_factories(exclude: &[String]) -> Vec<ModuleFactory> {
    get_all_builtin_modules()
        .into_iter()
        .filter(|module| {
            let name = module.module_info().name;
            let excluded = exclude.iter().any(|e| e.eq_ignore_ascii_case(&name));
            if excluded {
                log::debug!("Builtin module '{}' excluded", name);
            }
            !excluded
        })
        .map(|module| Box::new(move || module) as ModuleFactory)
        .collect()
}
