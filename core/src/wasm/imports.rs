//! Host functions for the core's imports
//!
//! The core imports a couple of logging hooks and an abort handler. Their
//! exact signatures vary between core builds, so every function import is
//! satisfied generically from the module's declared type.

use std::time::{Duration, Instant};

use anyhow::Result;
use hashbrown::HashMap;
use wasmtime::{Caller, ExternType, Linker, Module, Val, ValType};

/// Sentinel the core passes for "no value" in log arguments
const LOG_ARG_NONE: i32 = -9999;

/// Host-side data stored in each instance's `Store`
#[derive(Debug, Default)]
pub struct CoreContext {
    /// Log ids muted until the given instant (`consoleLogTimeout`)
    log_muted_until: HashMap<i32, Instant>,
}

impl CoreContext {
    /// Returns true if a throttled log with `id` may be emitted now, and mutes
    /// the id for `timeout` afterwards.
    fn admit_throttled(&mut self, id: i32, timeout: Duration) -> bool {
        let now = Instant::now();
        match self.log_muted_until.get(&id) {
            Some(until) if *until > now => false,
            _ => {
                self.log_muted_until.insert(id, now + timeout);
                true
            }
        }
    }
}

/// Build a linker that satisfies every function import of `module`
pub fn build_linker(module: &Module) -> Result<Linker<CoreContext>> {
    let mut linker = Linker::new(module.engine());
    // A module may import the same function more than once
    linker.allow_shadowing(true);

    for import in module.imports() {
        let ExternType::Func(ty) = import.ty() else {
            continue;
        };
        let module_name = import.module().to_string();
        let name = import.name().to_string();
        let result_types: Vec<ValType> = ty.results().collect();
        let kind = ImportKind::classify(&module_name, &name);

        linker.func_new(
            &module_name,
            &name,
            ty.clone(),
            move |mut caller: Caller<'_, CoreContext>, params: &[Val], results: &mut [Val]| {
                let arg = |i: usize| params.get(i).and_then(Val::i32).unwrap_or(LOG_ARG_NONE);
                match kind {
                    ImportKind::Log => log_core_message(arg(0), arg(1)),
                    ImportKind::LogTimeout => {
                        let timeout = Duration::from_millis(arg(2).max(0) as u64);
                        if caller.data_mut().admit_throttled(arg(0), timeout) {
                            log_core_message(arg(0), arg(1));
                        }
                    }
                    ImportKind::Abort => tracing::error!("core aborted"),
                    ImportKind::Other => {
                        tracing::trace!("unhandled core import called");
                    }
                }
                for (slot, ty) in results.iter_mut().zip(&result_types) {
                    *slot = zero_value(ty);
                }
                Ok(())
            },
        )?;
    }

    Ok(linker)
}

#[derive(Debug, Clone, Copy)]
enum ImportKind {
    Log,
    LogTimeout,
    Abort,
    Other,
}

impl ImportKind {
    fn classify(module: &str, name: &str) -> Self {
        match (module, name) {
            (_, "consoleLog") => ImportKind::Log,
            (_, "consoleLogTimeout") => ImportKind::LogTimeout,
            ("env", "abort") => ImportKind::Abort,
            _ => ImportKind::Other,
        }
    }
}

fn log_core_message(arg0: i32, arg1: i32) {
    let mut message = String::from("[WasmBoy]");
    if arg0 != LOG_ARG_NONE {
        message.push_str(&format!(" 0x{:x}", arg0));
    }
    if arg1 != LOG_ARG_NONE {
        message.push_str(&format!(" 0x{:x}", arg1));
    }
    tracing::debug!("{}", message);
}

fn zero_value(ty: &ValType) -> Val {
    match ty {
        ValType::I64 => Val::I64(0),
        ValType::F32 => Val::F32(0),
        ValType::F64 => Val::F64(0),
        _ => Val::I32(0),
    }
}
