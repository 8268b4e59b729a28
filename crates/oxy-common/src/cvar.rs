// cvar.rs — named configuration variables

use std::collections::HashMap;

use bitflags::bitflags;
use log::{info, warn};

use crate::q_shared::com_parse;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CvarFlags: u32 {
        /// Written out by `write_variables`.
        const ARCHIVE = 1 << 0;
        /// Only `force_set` may change it.
        const NOSET = 1 << 1;
        /// Changes wait in `latched_string` until `apply_latched`.
        const LATCH = 1 << 2;
    }
}

#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub flags: CvarFlags,
    pub modified: bool,
    pub value: f32,
}

/// A set of cvars. Each engine instance owns its own.
#[derive(Debug, Clone, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |v| v.value)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.string.as_str())
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, default: &str, flags: CvarFlags) -> &Cvar {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return &self.cvar_vars[idx];
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: default.to_string(),
            latched_string: None,
            flags,
            modified: true,
            value: parse_value(default),
        });
        self.cvar_index.insert(name.to_string(), idx);
        &self.cvar_vars[idx]
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) {
        let Some(&idx) = self.cvar_index.get(name) else {
            self.get(name, value, CvarFlags::empty());
            return;
        };
        let var = &mut self.cvar_vars[idx];

        if !force {
            if var.flags.contains(CvarFlags::NOSET) {
                warn!("{} is write protected.", name);
                return;
            }
            if var.flags.contains(CvarFlags::LATCH) {
                if var.string == value {
                    var.latched_string = None;
                } else {
                    info!("{} will be changed on the next level load.", name);
                    var.latched_string = Some(value.to_string());
                }
                return;
            }
        }

        if var.string == value {
            return;
        }
        var.string = value.to_string();
        var.value = parse_value(value);
        var.latched_string = None;
        var.modified = true;
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.set2(name, value, false);
    }

    /// Set ignoring NOSET and LATCH.
    pub fn force_set(&mut self, name: &str, value: &str) {
        self.set2(name, value, true);
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        let text = if value == value.trunc() {
            format!("{}", value as i64)
        } else {
            format!("{}", value)
        };
        self.set(name, &text);
    }

    /// Promote every latched value. Called on level load.
    pub fn apply_latched(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.value = parse_value(&latched);
                var.string = latched;
                var.modified = true;
            }
        }
    }

    /// Names of cvars changed since the last call; clears their flags.
    pub fn check_modified(&mut self) -> Vec<String> {
        self.cvar_vars
            .iter_mut()
            .filter(|v| v.modified)
            .map(|v| {
                v.modified = false;
                v.name.clone()
            })
            .collect()
    }

    /// Apply `name value` pairs, one per line, from a config text. Unknown
    /// names are created.
    pub fn exec_config(&mut self, text: &str) {
        for line in text.lines() {
            let Some((mut name, mut rest)) = com_parse(line) else {
                continue;
            };
            if name == "set" {
                let Some((n, r)) = com_parse(rest) else {
                    continue;
                };
                name = n;
                rest = r;
            }
            self.exec_pair(&name, rest);
        }
    }

    fn exec_pair(&mut self, name: &str, rest: &str) {
        match com_parse(rest) {
            Some((value, _)) => self.set(name, &value),
            None => warn!("config: no value for {}", name),
        }
    }

    /// Write archived cvars as `set name "value"` lines.
    pub fn write_variables(&self, writer: &mut dyn std::io::Write) -> std::io::Result<()> {
        for var in &self.cvar_vars {
            if var.flags.contains(CvarFlags::ARCHIVE) {
                writeln!(writer, "set {} \"{}\"", var.name, var.string)?;
            }
        }
        Ok(())
    }
}
