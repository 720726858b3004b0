use super::Value;
use crate::error::Error;
use crate::Result;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// The argument bundle of one call: positional values plus uniquely named ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    args: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl Params {
    pub fn new(args: Vec<Value>, named: Vec<(String, Value)>) -> Result<Self> {
        if let Some(duplicate) = named.iter().map(|(name, _)| name).duplicates().next() {
            return Err(Error::Generic(format!(
                "named argument `{}` given more than once",
                duplicate
            )));
        }
        Ok(Self { args, named })
    }

    pub fn positional(args: Vec<Value>) -> Self {
        Self {
            args,
            named: vec![],
        }
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }
    pub fn named(&self) -> &[(String, Value)] {
        &self.named
    }
    pub fn named_arg(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
    pub fn has_named(&self, name: &str) -> bool {
        self.named_arg(name).is_some()
    }

    pub fn shape(&self) -> String {
        let positional = self.args.iter().map(|x| x.runtime_ty().to_string());
        let named = self
            .named
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value.runtime_ty()));
        format!("({})", positional.chain(named).join(", "))
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let positional = self.args.iter().map(|x| x.to_string());
        let named = self
            .named
            .iter()
            .map(|(name, value)| format!("{} = {}", name, value));
        write!(f, "({})", positional.chain(named).join(", "))
    }
}
