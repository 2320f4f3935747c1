//! Schema configuration: the rule set governing scalar recognition.

/// The rule set by which raw scalar text decodes into a [`crate::Kind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Schema {
    /// Resolve from context; currently behaves as `Yaml12Core`.
    #[default]
    Auto,
    Yaml12Failsafe,
    Yaml12Core,
    Yaml12Json,
    Yaml11,
    Json,
}

impl Schema {
    pub(crate) fn resolved(self) -> Schema {
        match self {
            Schema::Auto => Schema::Yaml12Core,
            other => other,
        }
    }

    pub(crate) fn allows_plus_sign(self) -> bool {
        !matches!(self.resolved(), Schema::Json | Schema::Yaml12Json)
    }

    pub(crate) fn allows_hex_octal(self) -> bool {
        !matches!(self.resolved(), Schema::Json | Schema::Yaml12Json)
    }

    pub(crate) fn forbids_leading_zero(self) -> bool {
        matches!(self.resolved(), Schema::Json | Schema::Yaml12Json)
    }

    pub(crate) fn is_failsafe(self) -> bool {
        matches!(self.resolved(), Schema::Yaml12Failsafe)
    }

    pub(crate) fn is_yaml11(self) -> bool {
        matches!(self.resolved(), Schema::Yaml11)
    }
}
