//! In-memory stand-in for the reasoner process.
//!
//! [`MockTransport`] answers the subset of the protocol the adapter speaks
//! from a small simulated set of aboxes, and records every request line so
//! tests can assert on the exact traffic. Clones share state: keep one clone
//! for inspection and hand another to the connection.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use crate::statement::split;

use super::DEFAULT_ABOX;
use super::request::NAME_PREFIX;
use super::transport::LineTransport;

const NAMESPACE: &str = "http://lingua/kb#";
const OKAY: &str = ":okay";

#[derive(Debug, Clone, Default)]
struct Abox {
    /// (individual, concept)
    concepts: BTreeSet<(String, String)>,
    /// (subject, value, relation)
    roles: BTreeSet<(String, String, String)>,
}

impl Abox {
    fn individuals(&self) -> BTreeSet<String> {
        let mut all: BTreeSet<String> = self.concepts.iter().map(|(i, _)| i.clone()).collect();
        for (s, v, _) in &self.roles {
            all.insert(s.clone());
            all.insert(v.clone());
        }
        all
    }
}

#[derive(Debug)]
struct MockState {
    aboxes: BTreeMap<String, Abox>,
    current: Option<String>,
    features: HashSet<String>,
    inverses: HashMap<String, String>,
    subsumptions: HashSet<(String, String)>,
    grouped_listings: bool,
    failing_clones: bool,
    failing_loads: bool,
    stalled: usize,
    clones: usize,
    last_answer: String,
    log: Vec<String>,
    pending: VecDeque<String>,
    open: bool,
}

impl Default for MockState {
    fn default() -> Self {
        let mut aboxes = BTreeMap::new();
        aboxes.insert(DEFAULT_ABOX.to_string(), Abox::default());
        Self {
            aboxes,
            current: Some(DEFAULT_ABOX.to_string()),
            features: HashSet::new(),
            inverses: HashMap::new(),
            subsumptions: HashSet::new(),
            grouped_listings: true,
            failing_clones: false,
            failing_loads: false,
            stalled: 0,
            clones: 0,
            last_answer: String::new(),
            log: Vec::new(),
            pending: VecDeque::new(),
            open: true,
        }
    }
}

/// Simulated reasoner peer.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

fn name(arg: &str) -> String {
    arg.strip_prefix(NAME_PREFIX).unwrap_or(arg).to_string()
}

fn quote(name: &str) -> String {
    format!("|{NAMESPACE}{name}|")
}

fn list<I: IntoIterator<Item = String>>(items: I) -> String {
    let items: Vec<String> = items.into_iter().collect();
    if items.is_empty() {
        "NIL".to_string()
    } else {
        format!("({})", items.join(" "))
    }
}

fn truth(b: bool) -> String {
    if b { "T".into() } else { "NIL".into() }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock().expect("mock lock poisoned"));
        self
    }

    /// Declare `relation` single-valued.
    pub fn with_feature(self, relation: &str) -> Self {
        self.with_state(|s| {
            s.features.insert(relation.to_string());
        })
    }

    pub fn with_inverse(self, role: &str, inverse: &str) -> Self {
        self.with_state(|s| {
            s.inverses.insert(role.to_string(), inverse.to_string());
        })
    }

    /// Declare `general` to subsume `specific`.
    pub fn with_subsumption(self, general: &str, specific: &str) -> Self {
        self.with_state(|s| {
            s.subsumptions
                .insert((general.to_string(), specific.to_string()));
        })
    }

    /// Reject per-individual listings, forcing the scanning fallback.
    pub fn without_grouped_listings(self) -> Self {
        self.with_state(|s| s.grouped_listings = false)
    }

    /// Make every `clone-abox` fail.
    pub fn with_failing_clones(self) -> Self {
        self.with_state(|s| s.failing_clones = true)
    }

    /// Make every `owl-read-file` fail.
    pub fn with_failing_loads(self) -> Self {
        self.with_state(|s| s.failing_loads = true)
    }

    /// Swallow the reply to the next `n` requests, as a stalled peer would.
    pub fn stall(&self, n: usize) {
        self.state.lock().expect("mock lock poisoned").stalled = n;
    }

    /// Every request line written so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().expect("mock lock poisoned").log.clone()
    }

    /// Number of requests starting with `(command`.
    pub fn count(&self, command: &str) -> usize {
        let prefix = format!("({command}");
        self.requests()
            .iter()
            .filter(|r| r.starts_with(&prefix))
            .count()
    }

    pub fn current_abox(&self) -> Option<String> {
        self.state
            .lock()
            .expect("mock lock poisoned")
            .current
            .clone()
    }

    pub fn abox_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("mock lock poisoned")
            .aboxes
            .keys()
            .cloned()
            .collect()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().expect("mock lock poisoned").open
    }
}

impl MockState {
    fn current_abox(&self) -> Option<&Abox> {
        self.current.as_ref().and_then(|c| self.aboxes.get(c))
    }

    fn fail(&mut self, message: String) -> String {
        self.last_answer = message.clone();
        format!(":error {message}")
    }

    fn reply(&mut self, line: &str) -> String {
        let Ok(terms) = split(line) else {
            return self.fail(format!("unreadable request {line}"));
        };
        let Some((command, args)) = terms.split_first() else {
            return self.fail("empty request".into());
        };
        let arg = |i: usize| args.get(i).map(|a| name(a)).unwrap_or_default();

        match command.as_str() {
            "logging-on" | "|OWLAPI-enableSimplifiedProtocol|" | "prepare-abox" | "save-kb" => {
                OKAY.into()
            }
            "full-reset" => {
                *self = MockState {
                    features: std::mem::take(&mut self.features),
                    inverses: std::mem::take(&mut self.inverses),
                    subsumptions: std::mem::take(&mut self.subsumptions),
                    grouped_listings: self.grouped_listings,
                    failing_clones: self.failing_clones,
                    failing_loads: self.failing_loads,
                    log: std::mem::take(&mut self.log),
                    ..MockState::default()
                };
                OKAY.into()
            }
            "owl-read-file" => {
                let path = arg(0).trim_matches('"').to_string();
                if self.failing_loads {
                    return self.fail(format!("cannot read {path}"));
                }
                let abox = format!("|file://{path}|");
                self.aboxes.insert(abox.clone(), Abox::default());
                self.current = Some(abox.clone());
                abox
            }
            "get-namespace-prefix" => format!("\"{NAMESPACE}\""),
            "|OWLAPI-getLastAnswer|" => self.last_answer.clone(),
            "set-current-abox" => {
                let abox = arg(0);
                if self.aboxes.contains_key(&abox) {
                    self.current = Some(abox.clone());
                    abox
                } else {
                    self.fail(format!("unknown abox {abox}"))
                }
            }
            "clone-abox" => {
                let source = arg(0);
                match self.aboxes.get(&source).cloned() {
                    Some(copy) if !self.failing_clones => {
                        self.clones += 1;
                        let abox = format!("ABOX-{}", self.clones);
                        self.aboxes.insert(abox.clone(), copy);
                        self.current = Some(abox.clone());
                        abox
                    }
                    _ => self.fail(format!("cannot clone abox {source}")),
                }
            }
            "delete-abox" => {
                let abox = arg(0);
                self.aboxes.remove(&abox);
                if self.current.as_deref() == Some(abox.as_str()) {
                    self.current = None;
                }
                OKAY.into()
            }
            "feature?" => truth(self.features.contains(&arg(0))),
            "role-inverse" => match self.inverses.get(&arg(0)) {
                Some(inverse) => quote(inverse),
                None => "NIL".into(),
            },
            "concept-subsumes?" => {
                let (general, specific) = (arg(0), arg(1));
                truth(general == specific || self.subsumptions.contains(&(general, specific)))
            }
            "add-concept-assertion" | "forget-concept-assertion" => {
                let Some(abox) = self.aboxes.get_mut(&arg(0)) else {
                    return self.fail(format!("unknown abox {}", arg(0)));
                };
                let fact = (arg(1), arg(2));
                if command.starts_with("add") {
                    abox.concepts.insert(fact);
                } else {
                    abox.concepts.remove(&fact);
                }
                OKAY.into()
            }
            "add-role-assertion" | "forget-role-assertion" => {
                let Some(abox) = self.aboxes.get_mut(&arg(0)) else {
                    return self.fail(format!("unknown abox {}", arg(0)));
                };
                let fact = (arg(1), arg(2), arg(3));
                if command.starts_with("add") {
                    abox.roles.insert(fact);
                } else {
                    abox.roles.remove(&fact);
                }
                OKAY.into()
            }
            other => self.query(other, args),
        }
    }

    fn query(&mut self, command: &str, args: &[String]) -> String {
        let grouped = self.grouped_listings;
        let Some(abox) = self.current_abox() else {
            return self.fail("no current abox".into());
        };
        let arg = |i: usize| args.get(i).map(|a| name(a)).unwrap_or_default();

        match command {
            "individual-instance?" => truth(abox.concepts.contains(&(arg(0), arg(1)))),
            "individual-direct-types" => list(
                abox.concepts
                    .iter()
                    .filter(|(i, _)| *i == arg(0))
                    .map(|(_, c)| quote(c)),
            ),
            "concept-instances" => list(
                abox.concepts
                    .iter()
                    .filter(|(_, c)| *c == arg(0))
                    .map(|(i, _)| quote(i)),
            ),
            "individual-filled-roles" => list(
                abox.roles
                    .iter()
                    .filter(|(s, v, _)| *s == arg(0) && *v == arg(1))
                    .map(|(_, _, r)| quote(r)),
            ),
            "individuals-related?" => {
                truth(abox.roles.contains(&(arg(0), arg(1), arg(2))))
            }
            "retrieve" => match args.get(1).map(|p| retrieve(abox, p)) {
                Some(Some(found)) => {
                    if found.is_empty() {
                        "NIL".into()
                    } else {
                        let rows: Vec<String> = found
                            .iter()
                            .map(|x| format!("((?X {}))", quote(x)))
                            .collect();
                        format!("({})", rows.join(" "))
                    }
                }
                _ => self.fail("malformed retrieve".into()),
            },
            "all-individuals" => list(abox.individuals().iter().map(|i| quote(i))),
            "all-concept-assertions" => list(
                abox.concepts
                    .iter()
                    .map(|(i, c)| format!("({} {})", quote(i), quote(c))),
            ),
            "all-concept-assertions-for-individual" if grouped => list(
                abox.concepts
                    .iter()
                    .filter(|(i, _)| *i == arg(0))
                    .map(|(i, c)| format!("({} {})", quote(i), quote(c))),
            ),
            "all-role-assertions" => list(
                abox.roles
                    .iter()
                    .map(|(s, v, r)| format!("(({} {}) {})", quote(s), quote(v), quote(r))),
            ),
            other => self.fail(format!("undefined function {other}")),
        }
    }
}

/// Evaluate a `retrieve` body: `(x-pattern)` or `(neg (project-to (?x) (x-pattern)))`.
fn retrieve(abox: &Abox, body: &str) -> Option<BTreeSet<String>> {
    let terms = split(body).ok()?;
    if terms.first().map(String::as_str) == Some("neg") {
        let inner = split(terms.get(1)?).ok()?;
        let matched = retrieve(abox, inner.get(2)?)?;
        return Some(
            abox.individuals()
                .into_iter()
                .filter(|i| !matched.contains(i))
                .collect(),
        );
    }
    let t: Vec<String> = terms.iter().map(|t| name(t)).collect();
    let found = match t.as_slice() {
        [x, concept] if x == "?x" => abox
            .concepts
            .iter()
            .filter(|(_, c)| c == concept)
            .map(|(i, _)| i.clone())
            .collect(),
        [subject, x, relation] if x == "?x" => abox
            .roles
            .iter()
            .filter(|(s, _, r)| s == subject && r == relation)
            .map(|(_, v, _)| v.clone())
            .collect(),
        [x, value, relation] if x == "?x" => abox
            .roles
            .iter()
            .filter(|(_, v, r)| v == value && r == relation)
            .map(|(s, _, _)| s.clone())
            .collect(),
        _ => return None,
    };
    Some(found)
}

impl LineTransport for MockTransport {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut state = self.state.lock().expect("mock lock poisoned");
        if !state.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "mock closed"));
        }
        state.log.push(line.to_string());
        let reply = state.reply(line);
        if state.stalled > 0 {
            state.stalled -= 1;
        } else {
            state.pending.push_back(reply);
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut state = self.state.lock().expect("mock lock poisoned");
        Ok(state.pending.pop_front().unwrap_or_default())
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.lock().expect("mock lock poisoned").open = false;
        Ok(())
    }
}
