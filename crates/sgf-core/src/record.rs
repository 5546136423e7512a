//! The live move log: initial record construction and the append fast path.

use std::sync::LazyLock;

use regex::Regex;

use crate::game_data::{Color, Game, Move};
use crate::sgf::{self, GameTree, Node, SgfError};

pub const RULESET: &str = "Chinese";
pub const COMMENT: &str = "Game 1 x 1";

/// One property (optional ident) followed by one bracketed value.
static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]+)?\s*\[((?:\\.|[^\]\\])*)\]").expect("property regex")
});

/// Setup node for a fresh game. Empty seats are written as empty values.
pub fn setup_node(game: &Game) -> Node {
    Node::new()
        .with("FF", "4")
        .with("GM", "1")
        .with("SZ", game.board_size.to_string())
        .with("PB", game.black_id.clone().unwrap_or_default())
        .with("PW", game.white_id.clone().unwrap_or_default())
        .with("DT", game.created_at.format("%Y-%m-%d").to_string())
        .with("RE", "")
        .with("KM", format!("{:.1}", game.komi))
        .with("RU", RULESET)
        .with("C", COMMENT)
}

pub fn move_node(mv: &Move) -> Node {
    Node::new().with(mv.color.record_key(), mv.coordinates.clone())
}

/// Full tree for a game and the moves played so far.
pub fn build_tree(game: &Game, moves: &[Move]) -> GameTree {
    let mut tree = GameTree::new(setup_node(game));
    tree.nodes.extend(moves.iter().map(move_node));
    tree
}

pub fn initial_record(game: &Game) -> String {
    sgf::serialize(&build_tree(game, &[]))
}

/// Append one move node to serialized record text without re-parsing it.
///
/// Exactly one trailing `)` is removed, the move node is written and the
/// record is closed again. The result equals serializing the full tree with
/// the extra node.
pub fn append_move(record: &str, mv: &Move) -> Result<String, SgfError> {
    let body = record.strip_suffix(')').ok_or(SgfError::Unterminated)?;
    let mut out = String::with_capacity(body.len() + mv.coordinates.len() + 5);
    out.push_str(body);
    sgf::write_node(&mut out, &move_node(mv));
    out.push(')');
    Ok(out)
}

/// Ordered `B`/`W` moves of the record's main line.
pub fn move_history(record: &str) -> Result<Vec<Move>, SgfError> {
    let tree = sgf::parse(record)?;
    let mut moves = Vec::new();
    for node in tree.main_line() {
        for key in node.keys() {
            let Some(color) = Color::from_record_key(key) else {
                continue;
            };
            if let Some(coords) = node.first(key) {
                moves.push(Move::new(color, coords));
            }
        }
    }
    Ok(moves)
}

/// `RE` value for a game lost by `leaver` leaving the board, e.g. `W+R`.
pub fn resignation_result(leaver: Color) -> String {
    format!("{}+R", leaver.opponent().record_key())
}

/// Rewrite the root `RE` property of a record, keeping every move.
pub fn set_result(record: &str, result: &str) -> Result<String, SgfError> {
    let mut tree = sgf::parse(record)?;
    let root = tree.nodes.first_mut().ok_or(SgfError::Empty)?;
    root.set("RE", result);
    Ok(sgf::serialize(&tree))
}

/// First value of `key` anywhere in the record, without building the tree.
pub fn extract_property(record: &str, key: &str) -> Option<String> {
    let mut current: Option<&str> = None;
    for cap in PROPERTY_RE.captures_iter(record) {
        if let Some(ident) = cap.get(1) {
            current = Some(ident.as_str());
        }
        if current == Some(key) {
            return Some(sgf::unescape(&cap[2]));
        }
    }
    None
}
