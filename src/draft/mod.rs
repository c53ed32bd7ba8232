// Draft domain: players, picks, leagues and roster state.

pub mod league;
pub mod pick;
pub mod player;
pub mod roster;
