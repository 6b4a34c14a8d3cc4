//! Metric descriptors.
//!
//! A `Desc` is the immutable identity of one metric family: name, help, and
//! label shape. Construction never fails; a malformed descriptor carries its
//! validation error and is rejected when it reaches a registry.

use std::collections::HashSet;
use std::fmt;

use super::fingerprint::Fnv64;
use super::metric::LabelPair;

/// Label names owned by histogram/summary exposition.
pub const RESERVED_LABEL_NAMES: [&str; 2] = ["le", "quantile"];

/// `[a-zA-Z_][a-zA-Z0-9_]*`
fn matches_name_grammar(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Whether `name` is a valid fully-qualified metric name.
pub fn is_valid_metric_name(name: &str) -> bool {
    matches_name_grammar(name)
}

/// Whether `name` may be used as a user-supplied label name.
pub fn is_valid_label_name(name: &str) -> bool {
    matches_name_grammar(name) && !RESERVED_LABEL_NAMES.contains(&name)
}

/// Immutable identity and label-shape metadata for one metric family.
#[derive(Debug, Clone)]
pub struct Desc {
    fq_name: String,
    help: String,
    // sorted by label name
    const_labels: Vec<LabelPair>,
    variable_labels: Vec<String>,
    id: u64,
    dim_hash: u64,
    err: Option<String>,
}

impl Desc {
    /// Build a descriptor.
    ///
    /// Validates the name and label grammar, reserved and duplicate label
    /// names, and variable/constant overlap. On failure the returned
    /// descriptor is flagged invalid (`err()` is `Some`) instead of erroring
    /// here, so definition sites stay free of error handling.
    pub fn new(
        fq_name: impl Into<String>,
        help: impl Into<String>,
        variable_labels: &[&str],
        const_labels: &[(&str, &str)],
    ) -> Self {
        let mut const_labels: Vec<LabelPair> = const_labels
            .iter()
            .map(|(k, v)| LabelPair::new(*k, *v))
            .collect();
        const_labels.sort_by(|a, b| a.name.cmp(&b.name));

        let mut desc = Self {
            fq_name: fq_name.into(),
            help: help.into(),
            const_labels,
            variable_labels: variable_labels.iter().map(|s| s.to_string()).collect(),
            id: 0,
            dim_hash: 0,
            err: None,
        };

        if let Err(cause) = desc.validate() {
            tracing::debug!(name = %desc.fq_name, %cause, "descriptor flagged invalid");
            desc.err = Some(cause);
            return desc;
        }

        desc.id = desc.compute_id();
        desc.dim_hash = desc.compute_dim_hash();
        desc
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !is_valid_metric_name(&self.fq_name) {
            return Err(format!("{:?} is not a valid metric name", self.fq_name));
        }
        if self.help.is_empty() {
            return Err("help text must not be empty".into());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for lp in &self.const_labels {
            check_label_name(&lp.name)?;
            if !seen.insert(&lp.name) {
                return Err(format!("duplicate constant label name {:?}", lp.name));
            }
        }
        for name in &self.variable_labels {
            check_label_name(name)?;
            if self.const_labels.iter().any(|lp| &lp.name == name) {
                return Err(format!(
                    "label name {name:?} is both a constant and a variable label"
                ));
            }
            if !seen.insert(name) {
                return Err(format!("duplicate variable label name {name:?}"));
            }
        }
        Ok(())
    }

    // name + constant label values, in constant label name order
    fn compute_id(&self) -> u64 {
        let mut h = Fnv64::new();
        h.write_part(&self.fq_name);
        for lp in &self.const_labels {
            h.write_part(&lp.value);
        }
        h.finish()
    }

    // help + sorted set of every label name
    fn compute_dim_hash(&self) -> u64 {
        let mut names: Vec<&str> = self
            .const_labels
            .iter()
            .map(|lp| lp.name.as_str())
            .chain(self.variable_labels.iter().map(String::as_str))
            .collect();
        names.sort_unstable();

        let mut h = Fnv64::new();
        h.write_part(&self.help);
        for n in names {
            h.write_part(n);
        }
        h.finish()
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Constant label pairs, sorted by name.
    pub fn const_labels(&self) -> &[LabelPair] {
        &self.const_labels
    }

    /// Variable label names, in declaration order.
    pub fn variable_labels(&self) -> &[String] {
        &self.variable_labels
    }

    /// Identity fingerprint: name + constant label values.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Dimension fingerprint: help + all label names.
    pub fn dim_hash(&self) -> u64 {
        self.dim_hash
    }

    /// Validation error recorded at construction, if any.
    pub fn err(&self) -> Option<&str> {
        self.err.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.err.is_none()
    }

    /// Same identity and same help/label names. Invalid descriptors are never
    /// consistent with anything.
    pub fn is_consistent_with(&self, other: &Desc) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.id == other.id
            && self.dim_hash == other.dim_hash
    }

    /// Merge constant labels with `values` for the variable labels, sorted by
    /// label name. Returns `None` on cardinality mismatch.
    pub fn label_pairs(&self, values: &[String]) -> Option<Vec<LabelPair>> {
        if values.len() != self.variable_labels.len() {
            return None;
        }
        let mut out: Vec<LabelPair> = self.const_labels.clone();
        out.extend(
            self.variable_labels
                .iter()
                .zip(values)
                .map(|(n, v)| LabelPair::new(n.as_str(), v.as_str())),
        );
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Some(out)
    }
}

fn check_label_name(name: &str) -> std::result::Result<(), String> {
    if !matches_name_grammar(name) {
        return Err(format!("{name:?} is not a valid label name"));
    }
    if RESERVED_LABEL_NAMES.contains(&name) {
        return Err(format!("label name {name:?} is reserved"));
    }
    Ok(())
}

impl fmt::Display for Desc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let consts = self
            .const_labels
            .iter()
            .map(|lp| format!("{}={:?}", lp.name, lp.value))
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "Desc{{fq_name: {:?}, help: {:?}, const_labels: {{{}}}, variable_labels: [{}]}}",
            self.fq_name,
            self.help,
            consts,
            self.variable_labels.join(",")
        )
    }
}
