//! Heterogeneous collections: lists whose element types are decided at
//! runtime, recovered on decode through the registry's factories.

use std::borrow::Cow;
use std::fmt;

use statewire_text::token;
use statewire_text::{LineReader, LineWriter};

use crate::codec::{Codec, ValueCodec};
use crate::error::{ConfigError, DecodeError, EncodeError};
use crate::field::Category;
use crate::ops::{DecodeOptions, MergeOptions};
use crate::persist::{Persist, Persistable};
use crate::registry;

/// An ordered collection of registered values of mixed concrete types.
/// Slots may be empty; `None` travels as `null` and keeps its position.
///
/// Each element is written under its own type-name header, which is what
/// lets the decoder rebuild the right concrete type.
#[derive(Default)]
pub struct DynList {
    items: Vec<Option<Box<dyn Persistable>>>,
}

impl DynList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push<T: Persist>(&mut self, value: T) {
        self.items.push(Some(Box::new(value)));
    }

    /// Pushes an empty slot.
    pub fn push_null(&mut self) {
        self.items.push(None);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// The element at `index`, if the slot exists and is non-null.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&dyn Persistable> {
        self.items.get(index)?.as_deref()
    }

    /// The element at `index` downcast to `T`.
    #[must_use]
    pub fn get_as<T: Persist>(&self, index: usize) -> Option<&T> {
        self.get(index)?.as_any().downcast_ref()
    }

    /// Mutable access to the element at `index` downcast to `T`.
    pub fn get_mut_as<T: Persist>(&mut self, index: usize) -> Option<&mut T> {
        self.items
            .get_mut(index)?
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&dyn Persistable>> {
        self.items.iter().map(Option::as_deref)
    }
}

impl fmt::Debug for DynList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for item in &self.items {
            match item {
                Some(obj) => list.entry(&obj.type_name()),
                None => list.entry(&token::NULL),
            };
        }
        list.finish()
    }
}

fn element_equal(
    a: &Option<Box<dyn Persistable>>,
    b: &Option<Box<dyn Persistable>>,
) -> Result<bool, ConfigError> {
    match (a, b) {
        (None, None) => Ok(true),
        (Some(x), Some(y)) => x.eq_dyn(&**y),
        _ => Ok(false),
    }
}

fn truncated(r: &LineReader<'_>) -> DecodeError {
    statewire_text::WireError::TruncatedInput {
        line: r.line_number(),
    }
    .into()
}

/// Reads one full element: `null`, or a type-name header plus body.
fn parse_element(
    line: &str,
    r: &mut LineReader<'_>,
    opts: &DecodeOptions,
) -> Result<Option<Box<dyn Persistable>>, DecodeError> {
    if line == token::NULL {
        return Ok(None);
    }
    let header = token::parse_header(line, r.line_number())?;
    let Some(factory) = registry::factory_for(header.type_token) else {
        return Err(DecodeError::UnknownType {
            name: header.type_token.to_string(),
            line: r.line_number(),
        });
    };
    let mut obj = factory();
    obj.parse_body(r, opts)?;
    Ok(Some(obj))
}

struct ListCodec;

impl ValueCodec<DynList> for ListCodec {
    fn category(&self) -> Category {
        Category::Collection
    }

    fn type_token(&self) -> Cow<'static, str> {
        Cow::Borrowed("list")
    }

    fn emit(
        &self,
        value: &DynList,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<(), EncodeError> {
        w.open(&format!("{prefix}{}", token::format_header("list", None)))?;
        for item in &value.items {
            match item {
                None => w.line(token::NULL)?,
                Some(obj) => {
                    w.open(&token::format_header(obj.type_name(), None))?;
                    obj.emit_body(w)?;
                    w.close()?;
                }
            }
        }
        w.close()?;
        Ok(())
    }

    fn parse(
        &self,
        target: &mut DynList,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &DecodeOptions,
    ) -> Result<(), DecodeError> {
        let header = token::parse_header(value, r.line_number())?;
        if header.type_token != "list" || header.length.is_some() {
            return Err(DecodeError::StructuralMismatch {
                expected: "`list` block".to_string(),
                found: format!("`{}` block", header.type_token),
                line: r.line_number(),
            });
        }
        target.items.clear();
        loop {
            let Some(line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if line == "}" {
                return Ok(());
            }
            target.items.push(parse_element(&line, r, opts)?);
        }
    }

    fn diff(
        &self,
        a: &DynList,
        b: &DynList,
        prefix: &str,
        w: &mut LineWriter<'_>,
    ) -> Result<bool, EncodeError> {
        if self.equal(a, b)? {
            return Ok(false);
        }
        // Positional, like arrays: header carries the new length, and every
        // changed or appended slot is re-sent whole under its index.
        w.open(&format!(
            "{prefix}{}",
            token::format_header("list", Some(b.items.len()))
        ))?;
        for (i, bv) in b.items.iter().enumerate() {
            let unchanged = i < a.items.len() && element_equal(&a.items[i], bv)?;
            if unchanged {
                continue;
            }
            match bv {
                None => w.line(&format!("{i}={}", token::NULL))?,
                Some(obj) => {
                    w.open(&format!(
                        "{i}={}",
                        token::format_header(obj.type_name(), None)
                    ))?;
                    obj.emit_body(w)?;
                    w.close()?;
                }
            }
        }
        w.close()?;
        Ok(true)
    }

    fn merge(
        &self,
        target: &mut DynList,
        value: &str,
        r: &mut LineReader<'_>,
        opts: &MergeOptions,
    ) -> Result<(), DecodeError> {
        let header = token::parse_header(value, r.line_number())?;
        if header.type_token != "list" {
            return Err(DecodeError::StructuralMismatch {
                expected: "`list` block".to_string(),
                found: format!("`{}` block", header.type_token),
                line: r.line_number(),
            });
        }
        let new_len = header.length.ok_or_else(|| DecodeError::MalformedValue {
            expected: "list header with length".to_string(),
            found: value.to_string(),
            line: r.line_number(),
        })?;

        target.items.truncate(new_len);
        loop {
            let Some(line) = r.next_line()? else {
                return Err(truncated(r));
            };
            if line == "}" {
                break;
            }
            let Some((index, elem_value)) = token::split_field(&line) else {
                return Err(DecodeError::MalformedValue {
                    expected: "index=value patch line".to_string(),
                    found: line.clone(),
                    line: r.line_number(),
                });
            };
            let index: usize = index.parse().map_err(|_| DecodeError::MalformedValue {
                expected: "list index".to_string(),
                found: line.clone(),
                line: r.line_number(),
            })?;

            if index < target.items.len() {
                target.items[index] = merge_slot(
                    target.items[index].take(),
                    elem_value,
                    r,
                    opts,
                )?;
            } else if index == target.items.len() {
                target
                    .items
                    .push(parse_element(elem_value, r, &DecodeOptions::default())?);
            } else {
                return Err(DecodeError::StructuralMismatch {
                    expected: format!("list index at most {}", target.items.len()),
                    found: index.to_string(),
                    line: r.line_number(),
                });
            }
        }
        if target.items.len() != new_len {
            return Err(DecodeError::MalformedValue {
                expected: format!("{new_len} list elements after patch"),
                found: target.items.len().to_string(),
                line: r.line_number(),
            });
        }
        Ok(())
    }

    fn equal(&self, a: &DynList, b: &DynList) -> Result<bool, ConfigError> {
        if a.items.len() != b.items.len() {
            return Ok(false);
        }
        for (x, y) in a.items.iter().zip(&b.items) {
            if !element_equal(x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clone_value(&self, value: &DynList) -> Result<DynList, ConfigError> {
        let mut items = Vec::with_capacity(value.items.len());
        for item in &value.items {
            items.push(match item {
                Some(obj) => Some(obj.clone_dyn()?),
                None => None,
            });
        }
        Ok(DynList { items })
    }

    fn fresh(&self) -> DynList {
        DynList::new()
    }

    fn assign(
        &self,
        target: &mut DynList,
        source: &DynList,
        keep: bool,
    ) -> Result<(), ConfigError> {
        if !keep {
            *target = self.clone_value(source)?;
            return Ok(());
        }
        target.items.truncate(source.items.len());
        let shared = target.items.len();
        for (slot, src) in target.items.iter_mut().zip(&source.items) {
            let Some(s) = src else {
                *slot = None;
                continue;
            };
            let same_type = slot
                .as_deref()
                .is_some_and(|t| t.type_name() == s.type_name());
            if same_type {
                if let Some(t) = slot.as_deref_mut() {
                    t.copy_from_dyn(&**s, true)?;
                }
            } else {
                *slot = Some(s.clone_dyn()?);
            }
        }
        for src in &source.items[shared..] {
            target.items.push(match src {
                Some(s) => Some(s.clone_dyn()?),
                None => None,
            });
        }
        Ok(())
    }
}

/// Applies a patch line to an existing list slot, preserving the instance
/// when allowed and the concrete type still matches.
fn merge_slot(
    current: Option<Box<dyn Persistable>>,
    elem_value: &str,
    r: &mut LineReader<'_>,
    opts: &MergeOptions,
) -> Result<Option<Box<dyn Persistable>>, DecodeError> {
    if elem_value == token::NULL {
        return Ok(None);
    }
    let header = token::parse_header(elem_value, r.line_number())?;
    if let Some(mut existing) = current {
        if opts.keep_instances && existing.type_name() == header.type_token {
            // Changed slots travel whole, so re-parse into the instance.
            existing.parse_body(r, &DecodeOptions::default())?;
            return Ok(Some(existing));
        }
    }
    parse_element(elem_value, r, &DecodeOptions::default())
}

impl Codec<DynList> {
    /// Codec for a [`DynList`] of mixed registered types.
    #[must_use]
    pub fn list() -> Self {
        Self::from_inner(std::sync::Arc::new(ListCodec))
    }
}
