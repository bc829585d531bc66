//! Macro type descriptors
//!
//! A [`MacroTypes`] value tells the scanner which macro families are live for
//! a scenario. Everything not enabled here is inert text.

/// A group of built-in macro names resolved from the same entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MacroGroup {
    /// `{HOSTNAME}`, `{HOST.HOST}`, `{HOST.NAME}`
    Host,
    /// `{HOST.ID}`
    HostId,
    /// `{HOST.DESCRIPTION}`
    HostDescription,
    /// `{IPADDRESS}`, `{HOST.IP}`, `{HOST.DNS}`, `{HOST.CONN}`
    Interface,
    /// `{HOST.PORT}`
    InterfacePort,
    /// `{ITEM.LASTVALUE}`, `{ITEM.VALUE}`
    Item,
    /// `{TRIGGER.ID}`
    Trigger,
}

impl MacroGroup {
    /// Macro names of the group, without braces
    pub fn names(self) -> &'static [&'static str] {
        match self {
            MacroGroup::Host => &["HOSTNAME", "HOST.HOST", "HOST.NAME"],
            MacroGroup::HostId => &["HOST.ID"],
            MacroGroup::HostDescription => &["HOST.DESCRIPTION"],
            MacroGroup::Interface => &["IPADDRESS", "HOST.IP", "HOST.DNS", "HOST.CONN"],
            MacroGroup::InterfacePort => &["HOST.PORT"],
            MacroGroup::Item => &["ITEM.LASTVALUE", "ITEM.VALUE"],
            MacroGroup::Trigger => &["TRIGGER.ID"],
        }
    }

    pub fn contains(self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

/// Which macro families the scanner recognises
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTypes {
    /// Plain macros, `{HOST.HOST}`
    pub macros: Vec<MacroGroup>,
    /// Numbered macros, `{HOST.HOST}` and `{HOST.HOST1}`..`{HOST.HOST9}`
    pub macros_n: Vec<MacroGroup>,
    /// `{$NAME}` and `{$NAME:context}`
    pub usermacros: bool,
    /// `$1`..`$9`
    pub references: bool,
    /// `{#NAME}`
    pub lldmacros: bool,
    /// `{12345}`
    pub functionids: bool,
    /// `{host:key.func(param)}`
    pub functional: bool,
}

impl MacroTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_macros(mut self, groups: &[MacroGroup]) -> Self {
        push_unique(&mut self.macros, groups);
        self
    }

    pub fn with_macros_n(mut self, groups: &[MacroGroup]) -> Self {
        push_unique(&mut self.macros_n, groups);
        self
    }

    pub fn with_usermacros(mut self) -> Self {
        self.usermacros = true;
        self
    }

    pub fn with_references(mut self) -> Self {
        self.references = true;
        self
    }

    pub fn with_lldmacros(mut self) -> Self {
        self.lldmacros = true;
        self
    }

    pub fn with_functionids(mut self) -> Self {
        self.functionids = true;
        self
    }

    pub fn with_functional(mut self) -> Self {
        self.functional = true;
        self
    }

    /// True when nothing at all would be recognised
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
            && self.macros_n.is_empty()
            && !self.usermacros
            && !self.references
            && !self.lldmacros
            && !self.functionids
            && !self.functional
    }

    /// Group of a plain macro name, if enabled
    pub fn plain_group(&self, name: &str) -> Option<MacroGroup> {
        self.macros.iter().copied().find(|g| g.contains(name))
    }

    /// Group of a numbered macro base name, if enabled
    pub fn numbered_group(&self, name: &str) -> Option<MacroGroup> {
        self.macros_n.iter().copied().find(|g| g.contains(name))
    }

    /// Whether any simple (plain or numbered) macro group is enabled
    pub fn has_simple_macros(&self) -> bool {
        !self.macros.is_empty() || !self.macros_n.is_empty()
    }
}

fn push_unique(target: &mut Vec<MacroGroup>, groups: &[MacroGroup]) {
    for group in groups {
        if !target.contains(group) {
            target.push(*group);
        }
    }
}
