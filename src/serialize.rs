//! Binary serialization of constrained models.
//!
//! A serialized model is one self-contained blob:
//!
//! ```text
//! offset 0   8 bytes  magic "DIMODCQM"
//! offset 8   1 byte   format major version
//! offset 9   1 byte   format minor version
//! offset 10  4 bytes  u32 LE length L of the header text
//! offset 14  L bytes  JSON object, '\n'-terminated, space-padded so
//!                     that 14 + L is a multiple of 64
//! offset 14+L         directory archive
//! ```
//!
//! The header JSON holds `num_variables`, `num_constraints`,
//! `num_biases` and (since version 1.1) `num_quadratic_variables`. The
//! counts are recomputed at write time and never trusted at read time.
//!
//! The directory archive is a flat list of named entries, each framed as
//! `u32 LE name length, name, u64 LE data length, data`. It holds an
//! `objective` entry (absent when no objective was ever set) and, per
//! constraint, `constraints/<json-label>/{lhs, rhs, sense, discrete}`:
//! the left-hand expression blob, an 8-byte LE double, one ASCII sense
//! byte (`<`, `>`, `=`), and a one-byte discrete-group flag. Constraint
//! directory names are the JSON encoding of the label, so tuple and
//! integer labels round-trip with their structure intact.
//!
//! Decoding is atomic: the model is built into a fresh instance and any
//! structural problem surfaces as [`ModelError::MalformedArchive`] with
//! nothing partially constructed left visible.

use crate::constraint::Sense;
use crate::error::{ModelError, Result};
use crate::expr::{ExpressionKind, QuadraticExpression};
use crate::model::ConstrainedModel;
use crate::variables::{Variable, Vartype};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Magic prefix identifying a serialized constrained model.
pub const MAGIC: &[u8; 8] = b"DIMODCQM";

/// Format version written by this crate.
pub const FORMAT_VERSION: (u8, u8) = (1, 1);

const HEADER_ALIGNMENT: usize = 64;
const HEADER_PREFIX_LEN: usize = 14;

// ---------------------------------------------------------------------------
// Byte-level plumbing
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(ModelError::MalformedArchive("truncated data".into()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(buf))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

fn vartype_code(vartype: Vartype) -> u8 {
    match vartype {
        Vartype::Spin => b's',
        Vartype::Binary => b'b',
        Vartype::Integer => b'i',
        Vartype::Real => b'r',
        Vartype::Discrete => b'd',
    }
}

fn vartype_from_code(code: u8) -> Result<Vartype> {
    match code {
        b's' => Ok(Vartype::Spin),
        b'b' => Ok(Vartype::Binary),
        b'i' => Ok(Vartype::Integer),
        b'r' => Ok(Vartype::Real),
        b'd' => Ok(Vartype::Discrete),
        _ => Err(ModelError::MalformedArchive(format!(
            "unknown vartype code {code:#04x}"
        ))),
    }
}

fn label_to_json_text(label: &Variable) -> String {
    label.to_json().to_string()
}

fn label_from_json_text(text: &str) -> Result<Variable> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ModelError::MalformedArchive(format!("bad label json: {e}")))?;
    Variable::from_json(&value)
        .ok_or_else(|| ModelError::MalformedArchive(format!("unrepresentable label: {value}")))
}

// ---------------------------------------------------------------------------
// Expression blobs
// ---------------------------------------------------------------------------

/// Encodes an expression as a self-describing blob.
///
/// Layout: kind byte `B`/`Q` (for `B`, one uniform vartype code byte);
/// u32 variable count; per variable a u32-length JSON label and, for `Q`
/// kind, a vartype code byte plus a bounds-flags byte (bit 0 lower,
/// bit 1 upper) followed by the present bounds as LE doubles; the LE
/// double offset; one LE double linear bias per variable; u32 quadratic
/// term count; per term two u32 variable indices and an LE double bias.
fn encode_expression(expr: &QuadraticExpression) -> Vec<u8> {
    let mut out = Vec::new();
    let kind = expr.kind();
    match kind {
        ExpressionKind::BinaryQuadratic(vartype) => {
            out.push(b'B');
            out.push(vartype_code(vartype));
        }
        ExpressionKind::Quadratic => out.push(b'Q'),
    }

    out.extend((expr.num_variables() as u32).to_le_bytes());
    for (label, vartype, lower, upper, _) in expr.rows() {
        let text = label_to_json_text(label);
        out.extend((text.len() as u32).to_le_bytes());
        out.extend(text.as_bytes());
        if kind == ExpressionKind::Quadratic {
            out.push(vartype_code(vartype));
            let flags = (lower.is_some() as u8) | ((upper.is_some() as u8) << 1);
            out.push(flags);
            if let Some(lb) = lower {
                out.extend(lb.to_le_bytes());
            }
            if let Some(ub) = upper {
                out.extend(ub.to_le_bytes());
            }
        }
    }

    out.extend(expr.offset().to_le_bytes());
    for (_, _, _, _, linear) in expr.rows() {
        out.extend(linear.to_le_bytes());
    }

    out.extend((expr.num_interactions() as u32).to_le_bytes());
    for &(u, v, bias) in expr.raw_quadratic() {
        out.extend((u as u32).to_le_bytes());
        out.extend((v as u32).to_le_bytes());
        out.extend(bias.to_le_bytes());
    }
    out
}

fn decode_expression(data: &[u8]) -> Result<QuadraticExpression> {
    let mut reader = Reader::new(data);

    let mut expr = match reader.u8()? {
        b'B' => match vartype_from_code(reader.u8()?)? {
            Vartype::Binary => QuadraticExpression::binary(),
            Vartype::Spin => QuadraticExpression::spin(),
            other => {
                return Err(ModelError::MalformedArchive(format!(
                    "binary-quadratic expression with vartype {other:?}"
                )))
            }
        },
        b'Q' => QuadraticExpression::general(),
        code => {
            return Err(ModelError::MalformedArchive(format!(
                "unknown expression kind {code:#04x}"
            )))
        }
    };
    let quadratic_kind = expr.kind() == ExpressionKind::Quadratic;

    let num_variables = reader.u32()? as usize;
    let mut labels = Vec::with_capacity(num_variables);
    for _ in 0..num_variables {
        let len = reader.u32()? as usize;
        let text = std::str::from_utf8(reader.take(len)?)
            .map_err(|_| ModelError::MalformedArchive("label is not utf-8".into()))?;
        let label = label_from_json_text(text)?;

        if quadratic_kind {
            let vartype = vartype_from_code(reader.u8()?)?;
            let flags = reader.u8()?;
            let lower = if flags & 1 != 0 {
                Some(reader.f64()?)
            } else {
                None
            };
            let upper = if flags & 2 != 0 {
                Some(reader.f64()?)
            } else {
                None
            };
            expr.add_typed_variable(label.clone(), vartype, lower, upper)?;
        } else {
            expr.add_variable(label.clone(), None, None)?;
        }
        labels.push(label);
    }

    expr.add_offset(reader.f64()?);
    for label in &labels {
        let bias = reader.f64()?;
        expr.add_linear(label, bias)?;
    }

    let num_terms = reader.u32()? as usize;
    for _ in 0..num_terms {
        let u = reader.u32()? as usize;
        let v = reader.u32()? as usize;
        let bias = reader.f64()?;
        if u >= labels.len() || v >= labels.len() {
            return Err(ModelError::MalformedArchive(
                "quadratic term index out of range".into(),
            ));
        }
        expr.add_quadratic(&labels[u], &labels[v], bias)?;
    }
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Header and directory archive
// ---------------------------------------------------------------------------

fn write_header(out: &mut Vec<u8>, model: &ConstrainedModel) {
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION.0);
    out.push(FORMAT_VERSION.1);

    let mut text = serde_json::json!({
        "num_variables": model.variables().len(),
        "num_constraints": model.num_constraints(),
        "num_biases": model.num_biases(),
        "num_quadratic_variables": model.num_quadratic_variables(),
    })
    .to_string();
    text.push('\n');
    while (HEADER_PREFIX_LEN + text.len()) % HEADER_ALIGNMENT != 0 {
        text.push(' ');
    }

    out.extend((text.len() as u32).to_le_bytes());
    out.extend(text.as_bytes());
}

/// The descriptive statistics recorded in an archive header.
///
/// All counts are recomputed from the model at write time. They describe
/// the archive body but are not verified against it at read time; use
/// them for cheap inspection of a blob without decoding it.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderInfo {
    /// Format version of the archive.
    #[serde(skip)]
    pub version: (u8, u8),
    /// Number of registered variables.
    pub num_variables: u64,
    /// Number of constraints.
    pub num_constraints: u64,
    /// Total linear + quadratic term count.
    pub num_biases: u64,
    /// Quadratically-interacting variable count over all constraints.
    /// Absent in format 1.0 archives.
    #[serde(default)]
    pub num_quadratic_variables: Option<u64>,
}

/// Reads the header of a serialized model without decoding its archive
/// body.
pub fn header_info(data: &[u8]) -> Result<HeaderInfo> {
    read_header(&mut Reader::new(data))
}

/// Validates the prefix and header, leaving the reader at the start of
/// the archive.
fn read_header(reader: &mut Reader) -> Result<HeaderInfo> {
    let magic = reader.take(MAGIC.len())?;
    if magic != MAGIC {
        return Err(ModelError::MalformedArchive("bad magic prefix".into()));
    }
    let major = reader.u8()?;
    let minor = reader.u8()?;
    if major >= 2 {
        return Err(ModelError::FormatVersionUnsupported(major, minor));
    }

    let len = reader.u32()? as usize;
    let text = reader.take(len)?;
    let mut info: HeaderInfo = serde_json::from_slice(text)
        .map_err(|e| ModelError::MalformedArchive(format!("bad header json: {e}")))?;
    info.version = (major, minor);
    Ok(info)
}

fn write_entry(out: &mut Vec<u8>, name: &str, data: &[u8]) {
    out.extend((name.len() as u32).to_le_bytes());
    out.extend(name.as_bytes());
    out.extend((data.len() as u64).to_le_bytes());
    out.extend(data);
}

fn read_entries<'a>(reader: &mut Reader<'a>) -> Result<Vec<(String, &'a [u8])>> {
    let mut entries = Vec::new();
    while !reader.is_empty() {
        let name_len = reader.u32()? as usize;
        let name = std::str::from_utf8(reader.take(name_len)?)
            .map_err(|_| ModelError::MalformedArchive("entry name is not utf-8".into()))?
            .to_string();
        let data_len = reader.u64()? as usize;
        let data = reader.take(data_len)?;
        entries.push((name, data));
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Model codec
// ---------------------------------------------------------------------------

impl ConstrainedModel {
    /// Serializes the model to its binary archive form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out, self);

        if let Some(objective) = self.objective() {
            write_entry(&mut out, "objective", &encode_expression(objective));
        }

        for (label, comparison) in self.constraints() {
            let dir = label_to_json_text(label);
            write_entry(
                &mut out,
                &format!("constraints/{dir}/lhs"),
                &encode_expression(&comparison.lhs),
            );
            write_entry(
                &mut out,
                &format!("constraints/{dir}/rhs"),
                &comparison.rhs.to_le_bytes(),
            );
            write_entry(
                &mut out,
                &format!("constraints/{dir}/sense"),
                &[comparison.sense.symbol()],
            );
            write_entry(
                &mut out,
                &format!("constraints/{dir}/discrete"),
                &[self.is_discrete(label) as u8],
            );
        }
        out
    }

    /// Deserializes a model from its binary archive form.
    ///
    /// The inverse of [`ConstrainedModel::to_bytes`]. Rejects archives
    /// written by a newer major format version before reading any of the
    /// archive body.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(data);
        read_header(&mut reader)?;

        let entries = read_entries(&mut reader)?;
        let lookup: HashMap<&str, &[u8]> = entries
            .iter()
            .map(|(name, data)| (name.as_str(), *data))
            .collect();

        let mut model = ConstrainedModel::new();

        if let Some(blob) = lookup.get("objective") {
            model.set_objective(decode_expression(blob)?)?;
        }

        // Unique constraint directory names in first-seen order. The
        // label JSON may itself contain '/', so split off the field name
        // from the right.
        let mut dirs: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for (name, _) in &entries {
            if let Some(rest) = name.strip_prefix("constraints/") {
                if let Some((dir, _field)) = rest.rsplit_once('/') {
                    if seen.insert(dir) {
                        dirs.push(dir);
                    }
                }
            }
        }

        for dir in dirs {
            let entry = |field: &str| -> Result<&[u8]> {
                lookup
                    .get(format!("constraints/{dir}/{field}").as_str())
                    .copied()
                    .ok_or_else(|| {
                        ModelError::MalformedArchive(format!(
                            "constraint {dir} is missing its {field} entry"
                        ))
                    })
            };

            let lhs = decode_expression(entry("lhs")?)?;

            let rhs_bytes = entry("rhs")?;
            if rhs_bytes.len() != 8 {
                return Err(ModelError::MalformedArchive(format!(
                    "constraint {dir} has a malformed rhs"
                )));
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(rhs_bytes);
            let rhs = f64::from_le_bytes(buf);

            let sense_bytes = entry("sense")?;
            let sense = sense_bytes
                .first()
                .copied()
                .and_then(Sense::from_symbol)
                .ok_or_else(|| {
                    ModelError::MalformedArchive(format!("constraint {dir} has an unknown sense"))
                })?;

            let discrete = entry("discrete")?.iter().any(|&b| b != 0);

            let label = label_from_json_text(dir)?;
            model.add_constraint_from_expression(lhs, sense, rhs, Some(label.clone()))?;
            if discrete {
                model.mark_discrete(&label);
            }
        }

        Ok(model)
    }
}
