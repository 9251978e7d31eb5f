//! Diagnostic rendering of terms.
//!
//! This is what logs, disassembly and `PrologError`'s `Display` print. It
//! knows about lists and quoting of odd atom names, and nothing about
//! operators.

use itertools::Itertools;

use crate::backend::symbol::Interner;

use super::term::Term;

impl Interner {
    /// Render a term in canonical functional notation
    pub fn format_term(&self, term: &Term) -> String {
        let mut out = String::new();
        self.write_term(&mut out, term);
        out
    }

    fn write_term(&self, out: &mut String, term: &Term) {
        match term.deref() {
            Term::Var(v) => out.push_str(&format!("{:?}", v)),
            Term::Atom(a) => out.push_str(&quote_atom(self.name(a))),
            Term::Integer(n) => out.push_str(&n.to_string()),
            Term::BigInt(n) => out.push_str(&n.to_string()),
            Term::Rational(r) => out.push_str(&format!("{}r{}", r.numer(), r.denom())),
            Term::Float(f) => out.push_str(&format_float(f)),
            Term::Opaque(_) => out.push_str("<opaque>"),
            Term::Compound(c) if c.tag() == self.known().dot => self.write_list(out, term),
            Term::Compound(c) => {
                out.push_str(&quote_atom(self.name(self.tag_name(c.tag()))));
                out.push('(');
                let args = c.args().iter().map(|a| self.format_term(a)).join(",");
                out.push_str(&args);
                out.push(')');
            }
        }
    }

    fn write_list(&self, out: &mut String, term: &Term) {
        let dot = self.known().dot;
        let mut items = Vec::new();
        let mut current = term.deref();
        let tail = loop {
            match current {
                Term::Compound(ref c) if c.tag() == dot => {
                    items.push(self.format_term(&c.args()[0]));
                    let next = c.args()[1].deref();
                    current = next;
                }
                Term::Atom(a) if a == self.known().nil => break None,
                other => break Some(self.format_term(&other)),
            }
        };
        out.push('[');
        out.push_str(&items.join(","));
        if let Some(tail) = tail {
            out.push('|');
            out.push_str(&tail);
        }
        out.push(']');
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn quote_atom(name: &str) -> String {
    let plain = match name.chars().next() {
        Some(c) if c.is_lowercase() => name.chars().all(|c| c.is_alphanumeric() || c == '_'),
        _ => matches!(name, "[]" | "!" | ";" | "," | "{}"),
    };
    let symbolic = !name.is_empty() && name.chars().all(|c| "+-*/\\^<>=~:.?@#&$".contains(c));
    if plain || symbolic {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_compound_and_quoting() {
        let interner = Interner::new();
        let f = interner.tag_named("foo", 2);
        let t = Term::compound(
            f,
            vec![
                Term::Atom(interner.atom("Hello World")),
                Term::Float(2.0),
            ],
        );
        assert_eq!(interner.format_term(&t), "foo('Hello World',2.0)");
    }

    #[test]
    fn test_format_lists() {
        let interner = Interner::new();
        let closed = Term::list(&interner, vec![Term::Integer(1), Term::Integer(2)], None);
        assert_eq!(interner.format_term(&closed), "[1,2]");

        let tail = Term::Atom(interner.atom("t"));
        let partial = Term::list(&interner, vec![Term::Integer(1)], Some(tail));
        assert_eq!(interner.format_term(&partial), "[1|t]");
    }

    #[test]
    fn test_format_symbolic_atoms_unquoted() {
        let interner = Interner::new();
        assert_eq!(interner.format_term(&Term::Atom(interner.atom("=.."))), "=..");
        assert_eq!(interner.format_term(&Term::Atom(interner.atom("[]"))), "[]");
    }
}
