//! Tagged-variant card parsing. A card header is parsed into a [`Card`]
//! here, with all
//! arity/type validation happening at parse time — ingest handlers never
//! see a malformed card, only a fully-typed one.

use crate::tokenize::tokenize;
use crate::{Framer, WireError};
use xfer_types::Hash;

/// A fully parsed, type-checked protocol card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Card {
    /// `pull SCODE PCODE`
    Pull { scode: String, pcode: String },
    /// `push SCODE PCODE`
    Push { scode: String, pcode: String },
    /// `clone` or `clone V SEQ`
    Clone(CloneRequest),
    /// `login USER NONCE SIG`
    Login { user: String, nonce: String, sig: String },
    /// `have HASH [1]`
    Have { hash: Hash, private: bool },
    /// `igot HASH [1]`
    IGot { hash: Hash, private: bool },
    /// `ineed HASH`
    INeed { hash: Hash },
    /// `gimme HASH`
    Gimme { hash: Hash },
    /// `file HASH SIZE` or `file HASH DELTASRC SIZE`, plus payload.
    File(FileCard),
    /// `cfile HASH SIZE CODEC` or `cfile HASH DELTASRC SIZE CODEC`, plus payload.
    CFile(CFileCard),
    /// `atom HASH SIZE BOFF EOFF`, plus payload.
    Atom(AtomCard),
    /// `config NAME SIZE`, plus payload.
    Config { name: String, size: u64, payload: Vec<u8> },
    /// `cookie TEXT`
    Cookie { text: String },
    /// `private` — the next `file`/`cfile` card is private.
    Private,
    /// `clone_seqno N`
    CloneSeqno { next: i64 },
    /// `message TEXT`
    Message { text: String },
    /// `pragma NAME ARGS...`
    Pragma { name: String, args: Vec<String> },
    /// `error TEXT`
    Error { text: String },
}

/// The `clone` card's two shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneRequest {
    /// `clone` with no arguments — unversioned, enters full-pull mode.
    Unversioned,
    /// `clone V SEQ` — versioned, streamed from `SEQ` by ascending local-id.
    Versioned { version: i64, seq: i64 },
}

/// `file` card payload and header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCard {
    pub hash: Hash,
    pub delta_src: Option<Hash>,
    pub size: u64,
    pub payload: Vec<u8>,
}

/// `cfile` card payload and header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CFileCard {
    pub hash: Hash,
    pub delta_src: Option<Hash>,
    pub codec: String,
    pub size: u64,
    pub payload: Vec<u8>,
}

/// `atom` card payload and header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomCard {
    pub hash: Hash,
    pub size: u64,
    pub boff: u64,
    pub eoff: u64,
    pub payload: Vec<u8>,
}

fn malformed(msg: impl Into<String>) -> WireError {
    WireError::MalformedCard(msg.into())
}

fn parse_hash(token: &str) -> Result<Hash, WireError> {
    Hash::parse(token).map_err(|e| malformed(format!("bad hash {token:?}: {e}")))
}

/// Parse a non-negative integer token. Rejects a leading `-`, any
/// non-digit byte, and overflow.
fn parse_nonneg_i64(token: &str) -> Result<i64, WireError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("expected non-negative integer, got {token:?}")));
    }
    token
        .parse::<i64>()
        .map_err(|_| malformed(format!("integer overflow: {token:?}")))
}

fn parse_size(token: &str) -> Result<u64, WireError> {
    parse_nonneg_i64(token).map(|n| n as u64)
}

fn require_private_flag(token: Option<&&str>) -> Result<bool, WireError> {
    match token {
        None => Ok(false),
        Some(&"1") => Ok(true),
        Some(other) => Err(malformed(format!("expected '1' or nothing, got {other:?}"))),
    }
}

impl Card {
    /// Parse one card header line, consuming its binary payload (if any)
    /// from `framer`. `line` must be a non-empty, non-comment line.
    pub fn parse<'a>(line: &[u8], framer: &mut Framer<'a>) -> Result<Card, WireError> {
        let text =
            std::str::from_utf8(line).map_err(|_| malformed("card header is not valid UTF-8"))?;
        let tokens = tokenize(text);
        let (verb, args) = tokens
            .split_first()
            .ok_or_else(|| malformed("empty card line"))?;

        match *verb {
            "pull" => {
                if args.len() != 2 {
                    return Err(malformed("pull requires SCODE PCODE"));
                }
                Ok(Card::Pull {
                    scode: args[0].to_string(),
                    pcode: args[1].to_string(),
                })
            }
            "push" => {
                if args.len() != 2 {
                    return Err(malformed("push requires SCODE PCODE"));
                }
                Ok(Card::Push {
                    scode: args[0].to_string(),
                    pcode: args[1].to_string(),
                })
            }
            "clone" => match args.len() {
                0 => Ok(Card::Clone(CloneRequest::Unversioned)),
                2 => Ok(Card::Clone(CloneRequest::Versioned {
                    version: parse_nonneg_i64(args[0])?,
                    seq: parse_nonneg_i64(args[1])?,
                })),
                _ => Err(malformed("clone requires 0 or 2 arguments")),
            },
            "login" => {
                if args.len() != 3 {
                    return Err(malformed("login requires USER NONCE SIG"));
                }
                Ok(Card::Login {
                    user: args[0].to_string(),
                    nonce: args[1].to_string(),
                    sig: args[2].to_string(),
                })
            }
            "have" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(malformed("have requires HASH [1]"));
                }
                Ok(Card::Have {
                    hash: parse_hash(args[0])?,
                    private: require_private_flag(args.get(1))?,
                })
            }
            "igot" => {
                if args.is_empty() || args.len() > 2 {
                    return Err(malformed("igot requires HASH [1]"));
                }
                Ok(Card::IGot {
                    hash: parse_hash(args[0])?,
                    private: require_private_flag(args.get(1))?,
                })
            }
            "ineed" => {
                if args.len() != 1 {
                    return Err(malformed("ineed requires HASH"));
                }
                Ok(Card::INeed { hash: parse_hash(args[0])? })
            }
            "gimme" => {
                if args.len() != 1 {
                    return Err(malformed("gimme requires HASH"));
                }
                Ok(Card::Gimme { hash: parse_hash(args[0])? })
            }
            "file" => match args.len() {
                2 => {
                    let hash = parse_hash(args[0])?;
                    let size = parse_size(args[1])?;
                    let payload = framer.take_payload(size as usize)?.to_vec();
                    Ok(Card::File(FileCard {
                        hash,
                        delta_src: None,
                        size,
                        payload,
                    }))
                }
                3 => {
                    let hash = parse_hash(args[0])?;
                    let delta_src = parse_hash(args[1])?;
                    let size = parse_size(args[2])?;
                    let payload = framer.take_payload(size as usize)?.to_vec();
                    Ok(Card::File(FileCard {
                        hash,
                        delta_src: Some(delta_src),
                        size,
                        payload,
                    }))
                }
                _ => Err(malformed("file requires HASH SIZE or HASH DELTASRC SIZE")),
            },
            "cfile" => match args.len() {
                3 => {
                    let hash = parse_hash(args[0])?;
                    let size = parse_size(args[1])?;
                    let codec = args[2].to_string();
                    let payload = framer.take_payload(size as usize)?.to_vec();
                    Ok(Card::CFile(CFileCard {
                        hash,
                        delta_src: None,
                        codec,
                        size,
                        payload,
                    }))
                }
                4 => {
                    let hash = parse_hash(args[0])?;
                    let delta_src = parse_hash(args[1])?;
                    let size = parse_size(args[2])?;
                    let codec = args[3].to_string();
                    let payload = framer.take_payload(size as usize)?.to_vec();
                    Ok(Card::CFile(CFileCard {
                        hash,
                        delta_src: Some(delta_src),
                        codec,
                        size,
                        payload,
                    }))
                }
                _ => Err(malformed("cfile requires HASH SIZE CODEC or HASH DELTASRC SIZE CODEC")),
            },
            "atom" => {
                if args.len() != 4 {
                    return Err(malformed("atom requires HASH SIZE BOFF EOFF"));
                }
                let hash = parse_hash(args[0])?;
                let size = parse_size(args[1])?;
                let boff = parse_size(args[2])?;
                let eoff = parse_size(args[3])?;
                if eoff < boff || eoff > size {
                    return Err(malformed("atom BOFF/EOFF out of range"));
                }
                let payload = framer.take_payload((eoff - boff) as usize)?.to_vec();
                Ok(Card::Atom(AtomCard {
                    hash,
                    size,
                    boff,
                    eoff,
                    payload,
                }))
            }
            "config" => {
                if args.len() != 2 {
                    return Err(malformed("config requires NAME SIZE"));
                }
                let name = args[0].to_string();
                let size = parse_size(args[1])?;
                let payload = framer.take_payload(size as usize)?.to_vec();
                Ok(Card::Config { name, size, payload })
            }
            "cookie" => {
                if args.len() != 1 {
                    return Err(malformed("cookie requires TEXT"));
                }
                Ok(Card::Cookie { text: args[0].to_string() })
            }
            "private" => {
                if !args.is_empty() {
                    return Err(malformed("private takes no arguments"));
                }
                Ok(Card::Private)
            }
            "clone_seqno" => {
                if args.len() != 1 {
                    return Err(malformed("clone_seqno requires N"));
                }
                Ok(Card::CloneSeqno { next: parse_nonneg_i64(args[0])? })
            }
            "message" => {
                if args.is_empty() {
                    return Err(malformed("message requires TEXT"));
                }
                Ok(Card::Message { text: args.join(" ") })
            }
            "pragma" => {
                if args.is_empty() {
                    return Err(malformed("pragma requires NAME"));
                }
                Ok(Card::Pragma {
                    name: args[0].to_string(),
                    args: args[1..].iter().map(|s| s.to_string()).collect(),
                })
            }
            "error" => {
                if args.is_empty() {
                    return Err(malformed("error requires TEXT"));
                }
                Ok(Card::Error { text: args.join(" ") })
            }
            other => Err(WireError::UnknownCard(other.to_string())),
        }
    }

    /// Render a card back to its wire form, including any binary payload.
    /// The caller is responsible for appending the result to the outbound
    /// buffer in the order the emit planner decided.
    pub fn format(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Card::Pull { scode, pcode } => out.extend(format!("pull {scode} {pcode}\n").bytes()),
            Card::Push { scode, pcode } => out.extend(format!("push {scode} {pcode}\n").bytes()),
            Card::Clone(CloneRequest::Unversioned) => out.extend(b"clone\n"),
            Card::Clone(CloneRequest::Versioned { version, seq }) => {
                out.extend(format!("clone {version} {seq}\n").bytes())
            }
            Card::Login { user, nonce, sig } => {
                out.extend(format!("login {user} {nonce} {sig}\n").bytes())
            }
            Card::Have { hash, private } => {
                if *private {
                    out.extend(format!("have {hash} 1\n").bytes());
                } else {
                    out.extend(format!("have {hash}\n").bytes());
                }
            }
            Card::IGot { hash, private } => {
                if *private {
                    out.extend(format!("igot {hash} 1\n").bytes());
                } else {
                    out.extend(format!("igot {hash}\n").bytes());
                }
            }
            Card::INeed { hash } => out.extend(format!("ineed {hash}\n").bytes()),
            Card::Gimme { hash } => out.extend(format!("gimme {hash}\n").bytes()),
            Card::File(f) => {
                match &f.delta_src {
                    Some(src) => out.extend(format!("file {} {} {}\n", f.hash, src, f.size).bytes()),
                    None => out.extend(format!("file {} {}\n", f.hash, f.size).bytes()),
                }
                out.extend_from_slice(&f.payload);
                out.push(b'\n');
            }
            Card::CFile(f) => {
                match &f.delta_src {
                    Some(src) => out.extend(
                        format!("cfile {} {} {} {}\n", f.hash, src, f.size, f.codec).bytes(),
                    ),
                    None => out.extend(format!("cfile {} {} {}\n", f.hash, f.size, f.codec).bytes()),
                }
                out.extend_from_slice(&f.payload);
                out.push(b'\n');
            }
            Card::Atom(a) => {
                out.extend(format!("atom {} {} {} {}\n", a.hash, a.size, a.boff, a.eoff).bytes());
                out.extend_from_slice(&a.payload);
                out.push(b'\n');
            }
            Card::Config { name, size, payload } => {
                out.extend(format!("config {name} {size}\n").bytes());
                out.extend_from_slice(payload);
                out.push(b'\n');
            }
            Card::Cookie { text } => out.extend(format!("cookie {text}\n").bytes()),
            Card::Private => out.extend(b"private\n"),
            Card::CloneSeqno { next } => out.extend(format!("clone_seqno {next}\n").bytes()),
            Card::Message { text } => out.extend(format!("message {text}\n").bytes()),
            Card::Pragma { name, args } => {
                if args.is_empty() {
                    out.extend(format!("pragma {name}\n").bytes());
                } else {
                    out.extend(format!("pragma {name} {}\n", args.join(" ")).bytes());
                }
            }
            Card::Error { text } => out.extend(format!("error {text}\n").bytes()),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &[u8]) -> Card {
        let mut framer = Framer::new(input);
        let line = framer.next_line().unwrap();
        Card::parse(line, &mut framer).unwrap()
    }

    #[test]
    fn round_trips_have_without_private() {
        let hash = "a".repeat(40);
        let card = parse_one(format!("have {hash}\n").as_bytes());
        assert_eq!(card, Card::Have { hash: Hash::parse(&hash).unwrap(), private: false });
        assert_eq!(card.format(), format!("have {hash}\n").into_bytes());
    }

    #[test]
    fn round_trips_have_private() {
        let hash = "a".repeat(40);
        let card = parse_one(format!("have {hash} 1\n").as_bytes());
        assert_eq!(card, Card::Have { hash: Hash::parse(&hash).unwrap(), private: true });
        assert_eq!(card.format(), format!("have {hash} 1\n").into_bytes());
    }

    #[test]
    fn round_trips_file_with_payload() {
        let hash = "b".repeat(40);
        let input = format!("file {hash} 5\nhello\n");
        let card = parse_one(input.as_bytes());
        match &card {
            Card::File(f) => {
                assert_eq!(f.payload, b"hello");
                assert!(f.delta_src.is_none());
            }
            _ => panic!("expected File"),
        }
        assert_eq!(card.format(), input.into_bytes());
    }

    #[test]
    fn round_trips_file_with_delta_source() {
        let hash = "c".repeat(40);
        let src = "d".repeat(40);
        let input = format!("file {hash} {src} 5\nhello\n");
        let card = parse_one(input.as_bytes());
        match &card {
            Card::File(f) => assert_eq!(f.delta_src, Some(Hash::parse(&src).unwrap())),
            _ => panic!("expected File"),
        }
        assert_eq!(card.format(), input.into_bytes());
    }

    #[test]
    fn rejects_malformed_arity() {
        let mut framer = Framer::new(b"pull onlyone\n");
        let line = framer.next_line().unwrap();
        assert!(Card::parse(line, &mut framer).is_err());
    }

    #[test]
    fn rejects_negative_size() {
        let mut framer = Framer::new(b"file aaaa -5\n");
        let line = framer.next_line().unwrap();
        assert!(Card::parse(line, &mut framer).is_err());
    }

    #[test]
    fn unknown_verb_is_reported() {
        let mut framer = Framer::new(b"frobnicate 1\n");
        let line = framer.next_line().unwrap();
        match Card::parse(line, &mut framer) {
            Err(WireError::UnknownCard(verb)) => assert_eq!(verb, "frobnicate"),
            other => panic!("expected UnknownCard, got {other:?}"),
        }
    }

    #[test]
    fn clone_versioned_round_trips() {
        let input = "clone 3 1\n";
        let card = parse_one(input.as_bytes());
        assert_eq!(card, Card::Clone(CloneRequest::Versioned { version: 3, seq: 1 }));
        assert_eq!(card.format(), input.as_bytes());
    }

    #[test]
    fn atom_full_range_round_trips() {
        let hash = "e".repeat(40);
        let input = format!("atom {hash} 5 0 5\nhello\n");
        let card = parse_one(input.as_bytes());
        match &card {
            Card::Atom(a) => {
                assert_eq!(a.boff, 0);
                assert_eq!(a.eoff, 5);
                assert_eq!(a.payload, b"hello");
            }
            _ => panic!("expected Atom"),
        }
        assert_eq!(card.format(), input.into_bytes());
    }

    #[test]
    fn pragma_with_many_args_round_trips() {
        let input = "pragma link http://example.test 1 12345\n";
        let card = parse_one(input.as_bytes());
        assert_eq!(
            card,
            Card::Pragma {
                name: "link".to_string(),
                args: vec!["http://example.test".to_string(), "1".to_string(), "12345".to_string()],
            }
        );
        assert_eq!(card.format(), input.as_bytes());
    }
}
