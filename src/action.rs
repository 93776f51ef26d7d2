use crate::options::Choice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Cycle(Choice),
    PromptSearch,
    CloseHelp,
    KillPicked,
    None,
}
