/// Fetch, decode and collect the messages of one device.
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    collector::{LocationTable, RecordCollector},
    protocol::{cloudlocate, decode_message},
    record::{Decoded, LocationRecord},
    transport::{MessageSource, PositionResolver, Topics},
    AGResult, Error,
};

pub struct Extractor<S, R> {
    source: S,
    resolver: R,
    topics: Topics,
    response_timeout: Duration,
    carry_forward: bool,
}

impl<S, R> Extractor<S, R>
where
    S: MessageSource,
    R: PositionResolver,
{
    pub fn new(source: S, resolver: R, topics: Topics, response_timeout: Duration) -> Self {
        Self {
            source,
            resolver,
            topics,
            response_timeout,
            carry_forward: true,
        }
    }

    /// When disabled every message is decoded on top of an empty record.
    pub fn with_carry_forward(mut self, carry_forward: bool) -> Self {
        self.carry_forward = carry_forward;
        self
    }

    /// Process every message received for `device_guid` since `since`.
    ///
    /// Messages with an unsupported payload are skipped and listed in the table. Transport
    /// failures and oversized CloudLocate requests end the run.
    pub fn run(&mut self, device_guid: &str, since: &str) -> AGResult<LocationTable> {
        let messages = self.source.fetch_messages(device_guid, since)?;
        if messages.is_empty() {
            return Err(Error::EmptyResult);
        }

        let mut collector = RecordCollector::new();
        let mut previous = LocationRecord::default();
        for (i, msg) in messages.iter().enumerate() {
            let decoded = match decode_message(msg, &previous) {
                Ok(d) => d,
                Err(Error::UnsupportedPayload { len }) => {
                    collector.skip(i, len);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let record = match decoded {
                Decoded::Record(r) => r,
                Decoded::Pending(p) => {
                    info!("message {} holds raw measurements, asking CloudLocate", i);
                    cloudlocate::resolve(
                        &p,
                        &mut self.resolver,
                        &self.topics,
                        self.response_timeout,
                        &previous,
                    )?
                }
            };
            if let Some(Err(e)) = record.position().map(|p| p.validate()) {
                warn!("message {}: {}", i, e);
            }
            if self.carry_forward {
                previous = record.clone();
            }
            collector.push(i, record);
        }

        let table = collector.into_table()?;
        info!(
            "{} messages, {} records, {} complete, {} skipped",
            messages.len(),
            table.collected,
            table.rows.len(),
            table.skipped.len()
        );
        Ok(table)
    }
}
