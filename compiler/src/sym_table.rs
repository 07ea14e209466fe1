use std::collections::HashMap;

use derive_more::Display;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Display)]
pub enum Kind {
    #[display(fmt = "static")]
    Static,
    #[display(fmt = "field")]
    Field,
    #[display(fmt = "argument")]
    Argument,
    #[display(fmt = "local")]
    Local,
}

impl Kind {
    fn slot(self) -> usize {
        match self {
            Kind::Static => 0,
            Kind::Field => 1,
            Kind::Argument => 2,
            Kind::Local => 3,
        }
    }

    pub fn is_class_level(self) -> bool {
        matches!(self, Kind::Static | Kind::Field)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub tp: String,
    pub kind: Kind,
    pub index: u16,
}

/// One scope: names plus an independent running index per kind.
#[derive(Debug, Default)]
pub struct SymbolTable {
    rows: HashMap<String, Symbol>,
    counts: [u16; 4],
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn reset(&mut self) {
        self.rows.clear();
        self.counts = [0; 4];
    }

    /// Gives `name` the next index of `kind`. A previous entry under the same
    /// name is replaced and returned; other kinds' counters are untouched.
    /// Indices are `u16`, so a kind holds at most `u16::MAX` names; the
    /// compilation engine stops well before that.
    pub fn define(&mut self, name: &str, tp: &str, kind: Kind) -> Option<Symbol> {
        let index = self.counts[kind.slot()];
        self.counts[kind.slot()] += 1;
        self.rows.insert(
            name.to_string(),
            Symbol {
                name: name.to_string(),
                tp: tp.to_string(),
                kind,
                index,
            },
        )
    }

    pub fn var_count(&self, kind: Kind) -> u16 {
        self.counts[kind.slot()]
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.rows.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.get(name).map(|s| s.kind)
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|s| s.tp.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.get(name).map(|s| s.index)
    }
}

/// Class scope and subroutine scope seen as one chain, innermost first.
#[derive(Debug, Default)]
pub struct Scopes {
    class_table: SymbolTable,
    sub_routine_table: SymbolTable,
}

impl Scopes {
    pub fn new() -> Self {
        Scopes::default()
    }

    pub fn start_subroutine(&mut self) {
        self.sub_routine_table.reset();
    }

    pub fn define(&mut self, name: &str, tp: &str, kind: Kind) -> Option<Symbol> {
        if kind.is_class_level() {
            self.class_table.define(name, tp, kind)
        } else {
            self.sub_routine_table.define(name, tp, kind)
        }
    }

    pub fn var_count(&self, kind: Kind) -> u16 {
        if kind.is_class_level() {
            self.class_table.var_count(kind)
        } else {
            self.sub_routine_table.var_count(kind)
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.sub_routine_table
            .get(name)
            .or_else(|| self.class_table.get(name))
    }

    pub fn has_id(&self, name: &str) -> bool {
        return self.resolve(name).is_some();
    }
}
