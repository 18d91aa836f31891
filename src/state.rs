//! Named state mirror exposed to the host panel
//!
//! Stores the variables mirrored from Gabin feedback and notifies
//! subscribers on updates. Values are plain strings, the way the host
//! displays them; last write wins.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

/// Host-visible variables, a fixed key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Whether Gabin reports itself ready ("true"/"false")
    IsReady,
    /// Name of the shot Gabin last switched to
    CurrentShot,
    /// Last known autocam state ("true"/"false")
    Autocam,
}

impl Variable {
    pub const ALL: [Variable; 3] = [Variable::IsReady, Variable::CurrentShot, Variable::Autocam];

    /// Identifier the host panel references the variable by
    pub fn id(&self) -> &'static str {
        match self {
            Variable::IsReady => "gabin_is_ready",
            Variable::CurrentShot => "gabin_current_shot",
            Variable::Autocam => "gabin_autocam",
        }
    }

    /// Display name for the host panel
    pub fn name(&self) -> &'static str {
        match self {
            Variable::IsReady => "Gabin is ready",
            Variable::CurrentShot => "Gabin current shot",
            Variable::Autocam => "Gabin autocam state",
        }
    }
}

type VariableCallback = Arc<dyn Fn(Variable, &str) + Send + Sync>;

/// Stores variable values and notifies subscribers on updates
#[derive(Clone)]
pub struct VariableStore {
    values: Arc<RwLock<HashMap<Variable, String>>>,
    subscribers: Arc<RwLock<Vec<VariableCallback>>>,
}

impl VariableStore {
    /// Create a store with every variable initialized to an empty string
    pub fn new() -> Self {
        let mut values = HashMap::new();
        for var in Variable::ALL {
            values.insert(var, String::new());
        }

        Self {
            values: Arc::new(RwLock::new(values)),
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set a variable and publish the new value to subscribers
    pub fn set(&self, var: Variable, value: impl Into<String>) {
        let value = value.into();
        {
            self.values.write().insert(var, value.clone());
        }

        for subscriber in self.subscribers.read().iter() {
            subscriber(var, &value);
        }
    }

    /// Current value of a variable (empty string until first write)
    pub fn get(&self, var: Variable) -> String {
        self.values.read().get(&var).cloned().unwrap_or_default()
    }

    /// All variables with their current values, in declaration order
    pub fn snapshot(&self) -> Vec<(Variable, String)> {
        Variable::ALL.iter().map(|var| (*var, self.get(*var))).collect()
    }

    /// Subscribe to variable update notifications
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(Variable, &str) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(listener));
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}
