/// The three roles a node can hold (spec.md §3, §4.11). There is no "Candidate"
/// distinct from `Recoverer`: a node that has won a majority of promises but not yet
/// closed its recovery accepts is a `Recoverer`, matching the glossary definition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    Follower,
    Recoverer,
    Leader,
}

impl Default for Role {
    fn default() -> Self {
        Role::Follower
    }
}
