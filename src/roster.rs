//! Roster of live sessions
//!
//! Ordered collection of sessions (insertion order, removal never reorders),
//! the aggregate command counters and the shared secret. The Roster has no
//! interior locking: it is owned by the `ChatServer` actor, and every
//! mutation goes through one command at a time.

use std::cmp::Ordering;

use crate::session::Session;
use crate::types::ClientId;

/// Aggregate counters for the life of the process
///
/// Only ever incremented.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerCounters {
    /// `AUTH:` replies compared against the secret
    pub auth: u64,
    /// `NAME:` lines received during negotiation
    pub name: u64,
    pub say: u64,
    pub kick: u64,
    pub list: u64,
    /// Named sessions that left (explicitly or by closing the stream)
    pub leave: u64,
}

/// Outcome of a name claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameClaim {
    /// Name committed to the session
    Accepted,
    /// Name in use by another named session, or not a valid name
    Taken,
    /// No such session in the Roster
    Unknown,
}

/// Registry of all live sessions
#[derive(Debug)]
pub struct Roster {
    sessions: Vec<Session>,
    counters: ServerCounters,
    secret: String,
}

/// Case-insensitive (ASCII) ordering used for listings and statistics
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

/// Whether `name` can be carried by `MSG:` and `LIST:` lines
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains([':', ','])
}

impl Roster {
    /// Create an empty Roster guarding the given secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            sessions: Vec::new(),
            counters: ServerCounters::default(),
            secret: secret.into(),
        }
    }

    /// Compare a client-presented token against the secret
    ///
    /// Every attempt counts towards `auth`, matching or not.
    pub fn authenticate(&mut self, token: &str) -> bool {
        self.counters.auth += 1;
        token == self.secret
    }

    /// Admit an authenticated, still unnamed session
    pub fn admit(&mut self, session: Session) {
        self.sessions.push(session);
    }

    /// Check a candidate name and commit it in the same step
    ///
    /// Only named sessions are scanned; the claiming session itself is
    /// unnamed until this returns `Accepted`.
    pub fn claim_name(&mut self, id: ClientId, candidate: &str) -> NameClaim {
        self.counters.name += 1;

        if !self.sessions.iter().any(|s| s.id == id) {
            return NameClaim::Unknown;
        }
        if !is_valid_name(candidate) || self.is_name_taken(candidate) {
            return NameClaim::Taken;
        }

        match self.get_mut(id) {
            Some(session) if session.name.is_none() => {
                session.name = Some(candidate.to_string());
                NameClaim::Accepted
            }
            // A session is named at most once.
            Some(_) => NameClaim::Taken,
            None => NameClaim::Unknown,
        }
    }

    /// Whether any named session carries exactly this name
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.sessions.iter().any(|s| s.has_name(name))
    }

    pub fn get(&self, id: ClientId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }

    /// Find a named session by exact name
    pub fn find_named(&self, name: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.has_name(name))
    }

    /// Remove a session, keeping the order of the rest
    ///
    /// Returns None if it was already removed (or never admitted).
    pub fn remove(&mut self, id: ClientId) -> Option<Session> {
        let index = self.sessions.iter().position(|s| s.id == id)?;
        Some(self.sessions.remove(index))
    }

    /// Named sessions in insertion order
    pub fn named(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter().filter(|s| s.is_named())
    }

    /// Names of all named sessions, sorted case-insensitively
    pub fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.named().filter_map(|s| s.name.clone()).collect();
        names.sort_by(|a, b| compare_names(a, b));
        names
    }

    /// Count a `SAY:` from a named session; returns its name
    pub fn record_say(&mut self, id: ClientId) -> Option<String> {
        let session = self.get_mut(id).filter(|s| s.is_named())?;
        session.counters.say += 1;
        let name = session.name.clone();
        self.counters.say += 1;
        name
    }

    /// Count a `LIST:` from a named session
    pub fn record_list(&mut self, id: ClientId) -> bool {
        let Some(session) = self.get_mut(id).filter(|s| s.is_named()) else {
            return false;
        };
        session.counters.list += 1;
        self.counters.list += 1;
        true
    }

    /// Count a `KICK:` issued by a named session
    pub fn record_kick(&mut self, id: ClientId) -> bool {
        let Some(session) = self.get_mut(id).filter(|s| s.is_named()) else {
            return false;
        };
        session.counters.kick += 1;
        self.counters.kick += 1;
        true
    }

    /// Count a departure of a named session
    pub fn record_leave(&mut self) {
        self.counters.leave += 1;
    }

    pub fn counters(&self) -> ServerCounters {
        self.counters
    }

    /// Number of sessions, named or not
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Statistics report text, one line per entry, newline-terminated
    ///
    /// ```text
    /// @CLIENTS@
    /// <name>:SAY:<n>:KICK:<n>:LIST:<n>
    /// @SERVER@
    /// server:AUTH:<n>:NAME:<n>:SAY:<n>:KICK:<n>:LIST:<n>:LEAVE:<n>
    /// ```
    pub fn report(&self) -> String {
        let mut named: Vec<&Session> = self.named().collect();
        named.sort_by(|a, b| {
            compare_names(
                a.name.as_deref().unwrap_or_default(),
                b.name.as_deref().unwrap_or_default(),
            )
        });

        let mut out = String::from("@CLIENTS@\n");
        for line in named.iter().filter_map(|s| s.stats_line()) {
            out.push_str(&line);
            out.push('\n');
        }

        let ServerCounters {
            auth,
            name,
            say,
            kick,
            list,
            leave,
        } = self.counters;
        out.push_str("@SERVER@\n");
        out.push_str(&format!(
            "server:AUTH:{auth}:NAME:{name}:SAY:{say}:KICK:{kick}:LIST:{list}:LEAVE:{leave}\n"
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn admit_named(roster: &mut Roster, name: &str) -> ClientId {
        let id = admit_unnamed(roster);
        assert_eq!(roster.claim_name(id, name), NameClaim::Accepted);
        id
    }

    fn admit_unnamed(roster: &mut Roster) -> ClientId {
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = ClientId::new();
        assert!(roster.authenticate("x"));
        roster.admit(Session::new(id, tx));
        id
    }

    #[test]
    fn test_authenticate_counts_every_attempt() {
        let mut roster = Roster::new("s3cret");
        assert!(roster.authenticate("s3cret"));
        assert!(!roster.authenticate("S3CRET"));
        assert!(!roster.authenticate(""));
        assert_eq!(roster.counters().auth, 3);
        assert_eq!(roster.counters().name, 0);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_admit_unnamed() {
        let mut roster = Roster::new("x");
        assert!(roster.is_empty());

        let id = admit_unnamed(&mut roster);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.counters().auth, 1);
        assert!(!roster.get(id).unwrap().is_named());
        assert_eq!(roster.named().count(), 0);
    }

    #[test]
    fn test_claim_name_is_unique() {
        let mut roster = Roster::new("x");
        admit_named(&mut roster, "alice");

        let second = admit_unnamed(&mut roster);
        assert_eq!(roster.claim_name(second, "alice"), NameClaim::Taken);
        assert_eq!(roster.claim_name(second, "alice0"), NameClaim::Accepted);
        assert_eq!(roster.counters().name, 3);
        assert_eq!(roster.sorted_names(), vec!["alice", "alice0"]);
    }

    #[test]
    fn test_claim_name_is_case_sensitive() {
        let mut roster = Roster::new("x");
        admit_named(&mut roster, "alice");
        admit_named(&mut roster, "Alice");
        assert_eq!(roster.named().count(), 2);
    }

    #[test]
    fn test_claim_rejects_unusable_names() {
        let mut roster = Roster::new("x");
        let id = admit_unnamed(&mut roster);

        assert_eq!(roster.claim_name(id, ""), NameClaim::Taken);
        assert_eq!(roster.claim_name(id, "a:b"), NameClaim::Taken);
        assert_eq!(roster.claim_name(id, "a,b"), NameClaim::Taken);
        assert!(!roster.get(id).unwrap().is_named());
    }

    #[test]
    fn test_session_is_named_once() {
        let mut roster = Roster::new("x");
        let id = admit_named(&mut roster, "alice");
        assert_eq!(roster.claim_name(id, "bob"), NameClaim::Taken);
        assert!(roster.get(id).unwrap().has_name("alice"));
    }

    #[test]
    fn test_claim_unknown_session() {
        let mut roster = Roster::new("x");
        assert_eq!(roster.claim_name(ClientId::new(), "ghost"), NameClaim::Unknown);
    }

    #[test]
    fn test_unnamed_sessions_do_not_hold_names() {
        let mut roster = Roster::new("x");
        admit_unnamed(&mut roster);
        assert!(!roster.is_name_taken(""));
        assert!(roster.find_named("").is_none());
    }

    #[test]
    fn test_remove_at_most_once_and_keeps_order() {
        let mut roster = Roster::new("x");
        let a = admit_named(&mut roster, "a");
        let b = admit_named(&mut roster, "b");
        let c = admit_named(&mut roster, "c");

        assert!(roster.remove(b).is_some());
        assert!(roster.remove(b).is_none());

        let order: Vec<ClientId> = roster.named().map(|s| s.id).collect();
        assert_eq!(order, vec![a, c]);
        assert!(!roster.is_name_taken("b"));
    }

    #[test]
    fn test_sorted_names_case_insensitive() {
        let mut roster = Roster::new("x");
        admit_named(&mut roster, "Bob");
        admit_named(&mut roster, "alice");
        admit_named(&mut roster, "Zed");
        admit_unnamed(&mut roster);

        assert_eq!(roster.sorted_names().join(","), "alice,Bob,Zed");
    }

    #[test]
    fn test_compare_names_prefix() {
        assert_eq!(compare_names("ab", "ABC"), Ordering::Less);
        assert_eq!(compare_names("B", "a"), Ordering::Greater);
        assert_eq!(compare_names("Abc", "aBC"), Ordering::Equal);
    }

    #[test]
    fn test_record_counters() {
        let mut roster = Roster::new("x");
        let alice = admit_named(&mut roster, "alice");
        let pending = admit_unnamed(&mut roster);

        for _ in 0..3 {
            assert_eq!(roster.record_say(alice).as_deref(), Some("alice"));
        }
        assert!(roster.record_kick(alice));
        assert!(roster.record_say(pending).is_none());
        assert!(!roster.record_list(pending));

        let counters = roster.get(alice).unwrap().counters;
        assert_eq!((counters.say, counters.kick, counters.list), (3, 1, 0));
        assert_eq!(roster.counters().say, 3);
        assert_eq!(roster.counters().kick, 1);
        assert_eq!(roster.counters().list, 0);
    }

    #[test]
    fn test_report_format() {
        let mut roster = Roster::new("x");
        let zed = admit_named(&mut roster, "zed");
        let alice = admit_named(&mut roster, "alice");
        admit_unnamed(&mut roster);

        for _ in 0..3 {
            roster.record_say(alice);
        }
        roster.record_kick(alice);
        roster.record_list(zed);
        roster.record_leave();

        let report = roster.report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "@CLIENTS@",
                "alice:SAY:3:KICK:1:LIST:0",
                "zed:SAY:0:KICK:0:LIST:1",
                "@SERVER@",
                "server:AUTH:3:NAME:2:SAY:3:KICK:1:LIST:1:LEAVE:1",
            ]
        );
    }

    #[test]
    fn test_report_empty() {
        let roster = Roster::new("x");
        assert_eq!(
            roster.report(),
            "@CLIENTS@\n@SERVER@\nserver:AUTH:0:NAME:0:SAY:0:KICK:0:LIST:0:LEAVE:0\n"
        );
    }
}
