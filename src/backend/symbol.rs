//! Atom and tag interning for O(1) identity comparison.
//!
//! Atom names are interned with lasso's `ThreadedRodeo`, so two atoms are
//! equal exactly when their `Spur` keys are equal. Compound tags (name plus
//! arity) get a second level of interning: every distinct `(Atom, arity)`
//! pair maps to one `Tag` index. Predicate lookup, clause dispatch and
//! compound unification all compare tags as integers.
//!
//! The interner is owned (one per [`Database`](crate::backend::Database))
//! rather than a process-wide singleton, and is shared by reference through
//! the engine.
//!
//! # Example
//! ```
//! use horn::backend::Interner;
//!
//! let interner = Interner::new();
//! let a = interner.atom("hello");
//! let b = interner.atom("hello");
//! assert_eq!(a, b);
//! assert_eq!(interner.name(a), "hello");
//!
//! let f2 = interner.tag_named("f", 2);
//! assert_eq!(interner.tag_arity(f2), 2);
//! ```

use std::collections::HashMap;
use std::fmt;

use lasso::{Key, Spur, ThreadedRodeo};
use parking_lot::RwLock;

/// Interned atom - 4 bytes, O(1) comparison
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Atom(Spur);

impl Atom {
    /// Raw index of this atom in its interner
    #[inline]
    pub fn index(self) -> usize {
        self.0.into_usize()
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom#{}", self.index())
    }
}

/// Interned compound tag (functor name plus arity)
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Tag(u32);

impl Tag {
    /// Raw index of this tag in its interner
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct TagTable {
    ids: HashMap<(Atom, u32), Tag>,
    entries: Vec<(Atom, u32)>,
}

/// Atoms and tags the engine dispatches on, interned once at startup.
#[derive(Debug, Clone)]
pub struct Known {
    pub nil: Atom,
    pub true_: Atom,
    pub fail: Atom,
    pub false_: Atom,
    pub cut: Atom,
    pub callable: Atom,
    pub procedure: Atom,
    pub integer: Atom,
    pub list: Atom,
    pub calls: Atom,
    pub choice_points: Atom,
    pub operand_stack: Atom,

    pub true0: Tag,
    pub fail0: Tag,
    pub false0: Tag,
    pub cut0: Tag,
    pub comma: Tag,
    pub semicolon: Tag,
    pub arrow: Tag,
    pub not: Tag,
    pub unify: Tag,
    pub throw: Tag,
    pub catch: Tag,
    /// `call/1` through `call/8`, indexed by arity minus one
    pub call: [Tag; 8],
    pub dot: Tag,
    pub slash: Tag,
    pub error: Tag,
    pub query: Atom,
    pub meta_call: Atom,
}

/// Owned, thread-safe interner for atoms and compound tags
pub struct Interner {
    names: ThreadedRodeo<Spur>,
    tags: RwLock<TagTable>,
    known: Known,
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interner")
            .field("atoms", &self.names.len())
            .field("tags", &self.tags.read().entries.len())
            .finish()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    /// Create an interner with the control-construct atoms pre-registered
    pub fn new() -> Self {
        let names = ThreadedRodeo::new();
        let tags = RwLock::new(TagTable::default());

        let atom = |s: &str| Atom(names.get_or_intern(s));
        let tag = |s: &str, arity: u32| {
            let name = atom(s);
            let mut table = tags.write();
            Self::intern_tag(&mut table, name, arity)
        };

        let call = [
            tag("call", 1),
            tag("call", 2),
            tag("call", 3),
            tag("call", 4),
            tag("call", 5),
            tag("call", 6),
            tag("call", 7),
            tag("call", 8),
        ];

        let known = Known {
            nil: atom("[]"),
            true_: atom("true"),
            fail: atom("fail"),
            false_: atom("false"),
            cut: atom("!"),
            callable: atom("callable"),
            procedure: atom("procedure"),
            integer: atom("integer"),
            list: atom("list"),
            calls: atom("calls"),
            choice_points: atom("choice_points"),
            operand_stack: atom("operand_stack"),
            true0: tag("true", 0),
            fail0: tag("fail", 0),
            false0: tag("false", 0),
            cut0: tag("!", 0),
            comma: tag(",", 2),
            semicolon: tag(";", 2),
            arrow: tag("->", 2),
            not: tag("\\+", 1),
            unify: tag("=", 2),
            throw: tag("throw", 1),
            catch: tag("catch", 3),
            call,
            dot: tag(".", 2),
            slash: tag("/", 2),
            error: tag("error", 2),
            query: atom("$query"),
            meta_call: atom("$call"),
        };

        Self { names, tags, known }
    }

    fn intern_tag(table: &mut TagTable, name: Atom, arity: u32) -> Tag {
        if let Some(&tag) = table.ids.get(&(name, arity)) {
            return tag;
        }
        let tag = Tag(table.entries.len() as u32);
        table.entries.push((name, arity));
        table.ids.insert((name, arity), tag);
        tag
    }

    /// The pre-interned control atoms and tags
    #[inline]
    pub fn known(&self) -> &Known {
        &self.known
    }

    /// Intern an atom name
    #[inline]
    pub fn atom(&self, name: &str) -> Atom {
        Atom(self.names.get_or_intern(name))
    }

    /// Look up an atom without interning it
    pub fn lookup_atom(&self, name: &str) -> Option<Atom> {
        self.names.get(name).map(Atom)
    }

    /// The name of an atom
    #[inline]
    pub fn name(&self, atom: Atom) -> &str {
        self.names.resolve(&atom.0)
    }

    /// Intern a tag from an atom and an arity
    pub fn tag(&self, name: Atom, arity: usize) -> Tag {
        let arity = arity as u32;
        if let Some(&tag) = self.tags.read().ids.get(&(name, arity)) {
            return tag;
        }
        let mut table = self.tags.write();
        Self::intern_tag(&mut table, name, arity)
    }

    /// Intern a tag from a name and an arity
    pub fn tag_named(&self, name: &str, arity: usize) -> Tag {
        self.tag(self.atom(name), arity)
    }

    /// The `(name, arity)` pair of a tag
    pub fn tag_parts(&self, tag: Tag) -> (Atom, usize) {
        let table = self.tags.read();
        let (name, arity) = table.entries[tag.index()];
        (name, arity as usize)
    }

    /// The functor name of a tag
    #[inline]
    pub fn tag_name(&self, tag: Tag) -> Atom {
        self.tag_parts(tag).0
    }

    /// The arity of a tag
    #[inline]
    pub fn tag_arity(&self, tag: Tag) -> usize {
        self.tag_parts(tag).1
    }

    /// Render a tag as `name/arity`
    pub fn tag_indicator(&self, tag: Tag) -> String {
        let (name, arity) = self.tag_parts(tag);
        format!("{}/{}", self.name(name), arity)
    }

    /// Number of interned atoms
    pub fn atom_count(&self) -> usize {
        self.names.len()
    }

    /// Number of interned tags
    pub fn tag_count(&self) -> usize {
        self.tags.read().entries.len()
    }
}
