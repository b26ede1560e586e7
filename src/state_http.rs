/// Read-only HTTP view of the consensus cache.
///
///   GET /health
///   GET /state
///   GET /consensus/{market_id}
///   GET /sport/{sport}
///   GET /player/{name}
///   GET /game/{game_id}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use prop_consensus::bookmakers::display_name;
use prop_consensus::{Confidence, ConsensusMarket, PairedLeg, SyncEngine, SyncStatus};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

#[derive(Serialize, Debug)]
struct LegView {
    bookmaker:    String,
    display_name: String,
    line:         Option<f64>,
    over:         Option<i32>,
    under:        Option<i32>,
    confidence:   Confidence,
}

#[derive(Serialize, Debug)]
struct MarketView {
    market_id:        String,
    sport:            String,
    game_id:          Option<String>,
    game_start:       DateTime<Utc>,
    player_name:      Option<String>,
    prop_type:        String,
    line:             f64,
    over_odds:        i32,
    under_odds:       i32,
    no_line:          bool,
    insufficient:     bool,
    has_default_odds: bool,
    sync_status:      SyncStatus,
    last_sync:        DateTime<Utc>,
    bookmakers:       Vec<LegView>,
}

impl From<&PairedLeg> for LegView {
    fn from(leg: &PairedLeg) -> Self {
        Self {
            bookmaker:    leg.bookmaker.clone(),
            display_name: display_name(&leg.bookmaker),
            line:         leg.line(),
            over:         leg.over_price().map(|o| o.value),
            under:        leg.under_price().map(|u| u.value),
            confidence:   leg.confidence(),
        }
    }
}

impl From<&ConsensusMarket> for MarketView {
    fn from(m: &ConsensusMarket) -> Self {
        Self {
            market_id:        m.market_id.clone(),
            sport:            m.sport.clone(),
            game_id:          m.market.game_id.clone(),
            game_start:       m.game_start,
            player_name:      m.player_name.clone(),
            prop_type:        m.prop_type.clone(),
            line:             m.consensus.line,
            over_odds:        m.consensus.over_odds,
            under_odds:       m.consensus.under_odds,
            no_line:          m.consensus.no_line,
            insufficient:     m.consensus.insufficient_data,
            has_default_odds: m.consensus.has_default_odds,
            sync_status:      m.sync_status,
            last_sync:        m.last_sync,
            bookmakers:       m.legs.iter().map(LegView::from).collect(),
        }
    }
}

const JSON: &str = "application/json; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

fn json<T: Serialize>(value: &T) -> (&'static str, &'static str, String) {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    ("HTTP/1.1 200 OK", JSON, body)
}

fn list(markets: Vec<Arc<ConsensusMarket>>) -> (&'static str, &'static str, String) {
    let views: Vec<MarketView> = markets.iter().map(|m| MarketView::from(m.as_ref())).collect();
    json(&views)
}

async fn route(engine: &SyncEngine, method: &str, path: &str) -> (&'static str, &'static str, String) {
    let path = percent_decode(path);
    let mut segs = path.trim_matches('/').splitn(2, '/');
    let head = segs.next().unwrap_or("");
    let arg = segs.next().unwrap_or("");

    match (method, head, arg) {
        ("GET", "health", "") => ("HTTP/1.1 200 OK", TEXT, "ok".to_string()),
        ("GET", "state", "") => json(&engine.get_sync_state().await),
        ("GET", "consensus", id) if !id.is_empty() => match engine.get_consensus(id).await {
            Some(m) => json(&MarketView::from(m.as_ref())),
            None => ("HTTP/1.1 404 Not Found", TEXT, "unknown market".to_string()),
        },
        ("GET", "sport", s) if !s.is_empty() => list(engine.list_by_sport(s).await),
        ("GET", "player", p) if !p.is_empty() => list(engine.list_by_player(p).await),
        ("GET", "game", g) if !g.is_empty() => list(engine.list_by_game(g).await),
        _ => ("HTTP/1.1 404 Not Found", TEXT, "not found".to_string()),
    }
}

async fn handle_http_connection(mut stream: TcpStream, engine: Arc<SyncEngine>) -> Result<()> {
    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await.context("http read")?;
    if n == 0 {
        return Ok(());
    }

    let req = String::from_utf8_lossy(&buf[..n]);
    let first_line = req.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");
    let path = path.split('?').next().unwrap_or("");

    let (status_line, content_type, body) = route(&engine, method, path).await;

    let resp = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.as_bytes().len(),
        body
    );
    stream.write_all(resp.as_bytes()).await.context("http write")?;
    Ok(())
}

pub async fn start_http_server(engine: Arc<SyncEngine>, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await.context("http bind")?;
    info!(
        "prop-sync http listening on http://{} (GET /health, /state, /consensus/.., /sport/.., /player/.., /game/..)",
        bind
    );

    loop {
        let (stream, peer) = listener.accept().await.context("http accept")?;
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_http_connection(stream, engine).await {
                debug!("http handler err {}: {}", peer, e);
            }
        });
    }
}

/// `%XX` escapes and `+` as space. Malformed escapes pass through verbatim.
fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .filter(|h| h.bytes().all(|c| c.is_ascii_hexdigit()));
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
