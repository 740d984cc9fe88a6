//! Operator-entered figures
//!
//! Reserve, resource, production and cost figures are often only published in
//! technical reports. When the batch runs interactively the operator is
//! prompted for them, one ticker at a time.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::{Metal, SourceSnapshot};
use crate::infrastructure::http::parse_scaled_number;

const SOURCE: SourceId = SourceId::Manual;

const PROVIDES: &[FactKey] = &[
    FactKey::ReservesAuEqMoz,
    FactKey::ResourcesAuEqMoz,
    FactKey::ProductionAuEqKoz,
    FactKey::AiscLastYear,
];

/// One parsed answer: a number and an optional currency code after it
pub(crate) fn parse_answer(line: &str) -> Option<(f64, Option<Currency>)> {
    let mut tokens = line.split_whitespace();
    let value = parse_scaled_number(tokens.next()?)?;
    let currency = tokens.next().and_then(|t| Currency::new(t).ok());
    value.is_finite().then_some((value, currency))
}

pub struct ManualSource<R, W> {
    io: Mutex<(R, W)>,
    prompt_timeout: Duration,
}

impl ManualSource<BufReader<Stdin>, Stdout> {
    pub fn stdio(prompt_timeout: Duration) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), prompt_timeout)
    }
}

impl<R, W> ManualSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, prompt_timeout: Duration) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
            prompt_timeout,
        }
    }

    /// Ask one question; `None` ends the session (timeout, EOF or broken output)
    async fn ask(&self, io: &mut (R, W), question: &str) -> Option<String> {
        let (reader, writer) = io;
        writer.write_all(question.as_bytes()).await.ok()?;
        writer.flush().await.ok()?;

        let mut line = String::new();
        match tokio::time::timeout(self.prompt_timeout, reader.read_line(&mut line)).await {
            Ok(Ok(0)) => None,
            Ok(Ok(_)) => Some(line.trim().to_string()),
            Ok(Err(e)) => {
                debug!("Manual input unreadable: {}", e);
                None
            }
            Err(_) => {
                info!("No manual input within {:?}, skipping", self.prompt_timeout);
                None
            }
        }
    }
}

#[async_trait]
impl<R, W> SourceFetcher for ManualSource<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let mut io = self.io.lock().await;
        let mut snapshot = SourceSnapshot::new(SOURCE);

        for fact in PROVIDES {
            let question = format!("{} {} (blank to skip): ", company.ticker, fact.label());
            let Some(answer) = self.ask(&mut io, &question).await else {
                break;
            };
            let Some((value, currency)) = parse_answer(&answer) else {
                continue;
            };
            snapshot = if fact.is_monetary() {
                snapshot.amount(*fact, Some(value), currency)
            } else {
                snapshot.metal(*fact, Metal::GoldEquivalent, value)
            };
        }

        if snapshot.is_empty() {
            return Err(FetchError::NotFound {
                source_id: SOURCE,
                ticker: company.ticker.clone(),
            });
        }
        Ok(snapshot)
    }

    /// Every prompt gets its own timeout
    fn fetch_timeout(&self, _default: Duration) -> Duration {
        self.prompt_timeout * (PROVIDES.len() as u32 + 1)
    }
}
