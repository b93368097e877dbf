mod interaction;
mod view;

pub(super) use view::fuzzy_match_score;
