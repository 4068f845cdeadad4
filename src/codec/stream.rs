//! Incremental array encoding
//!
//! A [`FragmentStream`] is pulled by the consumer. Each call to `next`
//! encodes exactly one item, so an unbounded source is never buffered.
//! The release hook runs once: when the stream is exhausted, fails, or is
//! dropped early.

use crate::codec::encode::Encoder;
use crate::codec::{member_name, Path};
use crate::documents::{Element, XmlWriter};
use crate::error::Result;
use crate::model::{TypeId, TypeRegistry, Value};
use crate::namespaces::QName;
use std::fmt;

type Release<'c> = Box<dyn FnOnce() + Send + 'c>;

enum State {
    Start,
    Items,
    Done,
}

/// Serialized fragments of one array element
pub struct FragmentStream<'c, I> {
    registry: &'c TypeRegistry,
    writer: XmlWriter,
    wrapper: Element,
    member: TypeId,
    member_qname: QName,
    items: I,
    end_tag: String,
    child_writer: Option<XmlWriter>,
    state: State,
    index: usize,
    release: Option<Release<'c>>,
}

impl<I> fmt::Debug for FragmentStream<'_, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentStream")
            .field("wrapper", &self.wrapper.qname)
            .field("written", &self.index)
            .field("released", &self.release.is_none())
            .finish()
    }
}

impl<'c, I> FragmentStream<'c, I>
where
    I: Iterator<Item = Value>,
{
    pub(crate) fn new(
        registry: &'c TypeRegistry,
        writer: XmlWriter,
        name: QName,
        array: TypeId,
        items: I,
    ) -> Result<Self> {
        let (member, member_qname) = member_name(registry, array)?;
        Ok(Self {
            registry,
            writer,
            wrapper: Element::new(name),
            member,
            member_qname,
            items,
            end_tag: String::new(),
            child_writer: None,
            state: State::Start,
            index: 0,
            release: None,
        })
    }

    /// Run `release` once the stream ends or is dropped
    pub fn on_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'c,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Number of items written so far
    pub fn written(&self) -> usize {
        self.index
    }

    fn finish(&mut self) {
        self.state = State::Done;
        if let Some(release) = self.release.take() {
            tracing::debug!(element = %self.wrapper.qname, items = self.index, "releasing fragment source");
            release();
        }
    }

    fn start(&mut self) -> Result<String> {
        let (tag, name, scope) = self.writer.write_start(&self.wrapper)?;
        self.end_tag = self.writer.write_end(&name)?;
        self.child_writer = Some(self.writer.clone().with_scope(scope));
        Ok(tag)
    }

    fn item(&mut self, value: &Value) -> Result<String> {
        let mut path = Path::root(&self.wrapper.qname.local_name);
        path.push(&self.member_qname.local_name);
        let element = Encoder::new(self.registry).element(self.member_qname.clone(), self.member, value, &mut path)?;
        let writer = self.child_writer.as_ref().unwrap_or(&self.writer);
        writer.write(&element)
    }
}

impl<I> Iterator for FragmentStream<'_, I>
where
    I: Iterator<Item = Value>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Start => {
                self.state = State::Items;
                let started = self.start();
                if started.is_err() {
                    self.finish();
                }
                Some(started)
            }
            State::Items => match self.items.next() {
                Some(value) => {
                    let fragment = self.item(&value);
                    match fragment {
                        Ok(_) => self.index += 1,
                        Err(_) => self.finish(),
                    }
                    Some(fragment)
                }
                None => {
                    let end = std::mem::take(&mut self.end_tag);
                    self.finish();
                    Some(Ok(end))
                }
            },
            State::Done => None,
        }
    }
}

impl<I> Drop for FragmentStream<'_, I> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(element = %self.wrapper.qname, items = self.index, "fragment stream dropped early");
            release();
        }
    }
}
