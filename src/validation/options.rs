//! Validation strictness flags.
//!
//! # Responsibilities
//! - Hold the optional-rule flags (formats, patterns, defaults, examples)
//! - Compose option mutators into an immutable bundle
//! - Carry the bundle explicitly through [`ValidationScope`]
//!
//! # Design Decisions
//! - Mutators are plain functions `ValidationOptions -> ValidationOptions`
//! - Composition is order-sensitive: the last mutator touching a flag wins
//! - A scope without an attached bundle reads as all defaults, never an error

/// A single option mutator.
pub type ValidationOption = fn(ValidationOptions) -> ValidationOptions;

/// Flags controlling which optional validation rules are active.
///
/// The default value has format validation off, pattern validation on,
/// default-value validation on and example validation on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ValidationOptions {
    examples_validation_as_req: bool,
    examples_validation_as_res: bool,
    examples_validation_disabled: bool,
    schema_defaults_validation_disabled: bool,
    schema_format_validation_enabled: bool,
    schema_pattern_validation_disabled: bool,
}

impl ValidationOptions {
    /// Build a bundle from defaults by applying `opts` in order.
    pub fn from_options(opts: &[ValidationOption]) -> Self {
        opts.iter().fold(Self::default(), |acc, opt| opt(acc))
    }

    pub fn examples_validation_as_req(&self) -> bool {
        self.examples_validation_as_req
    }

    pub fn examples_validation_as_res(&self) -> bool {
        self.examples_validation_as_res
    }

    pub fn examples_validation_disabled(&self) -> bool {
        self.examples_validation_disabled
    }

    pub fn schema_defaults_validation_disabled(&self) -> bool {
        self.schema_defaults_validation_disabled
    }

    pub fn schema_format_validation_enabled(&self) -> bool {
        self.schema_format_validation_enabled
    }

    pub fn schema_pattern_validation_disabled(&self) -> bool {
        self.schema_pattern_validation_disabled
    }
}

/// Validate `format` keywords. Off by default.
pub fn enable_schema_format_validation() -> ValidationOption {
    |o| ValidationOptions {
        schema_format_validation_enabled: true,
        ..o
    }
}

pub fn disable_schema_format_validation() -> ValidationOption {
    |o| ValidationOptions {
        schema_format_validation_enabled: false,
        ..o
    }
}

pub fn enable_schema_pattern_validation() -> ValidationOption {
    |o| ValidationOptions {
        schema_pattern_validation_disabled: false,
        ..o
    }
}

/// Skip `pattern` keywords entirely.
pub fn disable_schema_pattern_validation() -> ValidationOption {
    |o| ValidationOptions {
        schema_pattern_validation_disabled: true,
        ..o
    }
}

pub fn enable_schema_defaults_validation() -> ValidationOption {
    |o| ValidationOptions {
        schema_defaults_validation_disabled: false,
        ..o
    }
}

/// Stop checking schema `default` values against their schema.
pub fn disable_schema_defaults_validation() -> ValidationOption {
    |o| ValidationOptions {
        schema_defaults_validation_disabled: true,
        ..o
    }
}

pub fn enable_examples_validation() -> ValidationOption {
    |o| ValidationOptions {
        examples_validation_disabled: false,
        ..o
    }
}

pub fn disable_examples_validation() -> ValidationOption {
    |o| ValidationOptions {
        examples_validation_disabled: true,
        ..o
    }
}

/// Examples must not carry `readOnly` properties.
pub fn validate_examples_as_request() -> ValidationOption {
    |o| ValidationOptions {
        examples_validation_as_req: true,
        ..o
    }
}

/// Examples must not carry `writeOnly` properties.
pub fn validate_examples_as_response() -> ValidationOption {
    |o| ValidationOptions {
        examples_validation_as_res: true,
        ..o
    }
}

/// Per-request validation configuration, threaded by value.
///
/// A fresh scope has no bundle attached and reports default options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationScope {
    options: Option<ValidationOptions>,
}

impl ValidationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a scope carrying `opts` applied on top of the current bundle.
    ///
    /// An empty `opts` returns the scope unchanged, without attaching a bundle.
    pub fn with_validation_options(self, opts: &[ValidationOption]) -> Self {
        if opts.is_empty() {
            return self;
        }
        let base = self.options.unwrap_or_default();
        Self {
            options: Some(opts.iter().fold(base, |acc, opt| opt(acc))),
        }
    }

    /// The attached bundle, or defaults when none is attached.
    pub fn validation_options(&self) -> ValidationOptions {
        self.options.unwrap_or_default()
    }

    pub fn has_options(&self) -> bool {
        self.options.is_some()
    }
}
