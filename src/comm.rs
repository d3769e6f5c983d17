//! Message passing between the ranks of a fixed size group.
//!
//! [`Communicator`] is the only capability the coordinator and the workers
//! share: ordered point-to-point messages per (source, destination) pair,
//! plus root based collectives built on top of them. Collectives are
//! synchronization points, every rank of the group has to enter them.
//!
//! [`ChannelComm`] runs each rank on its own thread. Ranks share nothing but
//! channels of encoded frames, so every payload is serialized on send and
//! decoded (and validated) on receipt.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{Error, Result};
use crate::protocol::{Envelope, Payload};

pub trait Communicator: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Queue `payload` for `dest`. Messages to the same destination arrive
    /// in the order they were sent.
    fn send(&self, dest: usize, payload: Payload) -> Result<()>;

    /// Block until the next message from `source` arrives. An abort
    /// notice from `source` surfaces as [`Error::Aborted`].
    fn recv(&self, source: usize) -> Result<Envelope>;

    /// Tell every other rank that this rank gave up. Best effort, delivery
    /// failures are ignored since the group is going down anyway.
    fn abort(&self, reason: &str);

    fn is_root(&self, root: usize) -> bool {
        self.rank() == root
    }

    /// Root sends `payload` to every other rank; everyone returns the same
    /// envelope. If the root cannot reach a rank it aborts the whole group
    /// so nobody continues with a value the others never saw.
    fn broadcast(&self, root: usize, payload: Option<Payload>) -> Result<Envelope> {
        if !self.is_root(root) {
            return self.recv(root);
        }
        let payload = payload.ok_or_else(|| {
            Error::InvalidConfig(format!("broadcast root {root} has nothing to send"))
        })?;
        for dest in (0..self.size()).filter(|&r| r != root) {
            if let Err(e) = self.send(dest, payload.clone()) {
                self.abort(&format!("broadcast failed: {e}"));
                return Err(e);
            }
        }
        Ok(Envelope::new(root, payload))
    }

    /// Every rank contributes one payload. The root gets all of them in
    /// rank order, the other ranks get `None`.
    fn gather(&self, root: usize, payload: Payload) -> Result<Option<Vec<Envelope>>> {
        if !self.is_root(root) {
            self.send(root, payload)?;
            return Ok(None);
        }
        let mut gathered = Vec::with_capacity(self.size());
        let mut own = Some(payload);
        for source in 0..self.size() {
            if source == root {
                if let Some(payload) = own.take() {
                    gathered.push(Envelope::new(root, payload));
                }
            } else {
                gathered.push(self.recv(source)?);
            }
        }
        Ok(Some(gathered))
    }

    /// No rank leaves until every rank has entered.
    fn barrier(&self) -> Result<()> {
        const ROOT: usize = 0;
        if let Some(tokens) = self.gather(ROOT, Payload::Token)? {
            for token in tokens {
                token.into_token()?;
            }
        }
        self.broadcast(ROOT, Some(Payload::Token))?.into_token()
    }
}

/// One rank's endpoint of an in-process group.
pub struct ChannelComm {
    rank: usize,
    outboxes: Vec<Sender<Vec<u8>>>,
    inboxes: Vec<Receiver<Vec<u8>>>,
}

impl ChannelComm {
    /// Wires up `size` fully connected endpoints, one per rank. Each
    /// ordered pair of ranks gets its own channel so that per-pair message
    /// order is preserved and receives can select their source.
    pub fn group(size: usize) -> Vec<ChannelComm> {
        let mut outboxes: Vec<Vec<Sender<Vec<u8>>>> = vec![Vec::with_capacity(size); size];
        let mut inboxes: Vec<Vec<Receiver<Vec<u8>>>> = vec![Vec::with_capacity(size); size];
        for source in 0..size {
            for dest in 0..size {
                let (tx, rx) = unbounded();
                outboxes[source].push(tx);
                inboxes[dest].push(rx);
            }
        }
        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| ChannelComm {
                rank,
                outboxes,
                inboxes,
            })
            .collect()
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer < self.size() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "rank {peer} outside a group of {}",
                self.size()
            )))
        }
    }
}

impl Communicator for ChannelComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn send(&self, dest: usize, payload: Payload) -> Result<()> {
        self.check_peer(dest)?;
        let envelope = Envelope::new(self.rank, payload);
        trace!(
            "rank {} -> {}: {} ({} elements)",
            self.rank,
            dest,
            envelope.tag(),
            envelope.len
        );
        let frame = envelope.encode()?;
        self.outboxes[dest]
            .send(frame)
            .map_err(|_| Error::Disconnected(dest))
    }

    fn recv(&self, source: usize) -> Result<Envelope> {
        self.check_peer(source)?;
        let frame = self.inboxes[source]
            .recv()
            .map_err(|_| Error::Disconnected(source))?;
        let envelope = Envelope::decode(&frame)?;
        if envelope.source != source {
            return Err(Error::protocol(
                source,
                format!("frame claims to come from rank {}", envelope.source),
            ));
        }
        if let Payload::Abort(reason) = envelope.payload {
            return Err(Error::Aborted {
                rank: source,
                reason,
            });
        }
        Ok(envelope)
    }

    fn abort(&self, reason: &str) {
        warn!("rank {} aborting the group: {}", self.rank, reason);
        for dest in (0..self.size()).filter(|&r| r != self.rank) {
            let notice = Envelope::new(self.rank, Payload::Abort(reason.to_string()));
            if let Ok(frame) = notice.encode() {
                let _ = self.outboxes[dest].send(frame);
            }
        }
    }
}

/// Runs `body` once per rank of a fresh `size` rank group, each rank on its
/// own thread, and returns the per-rank outcomes in rank order.
///
/// A rank that fails hands its error back here after aborting the group, so
/// the other ranks fail too instead of waiting for it.
pub fn run_group<T, F>(size: usize, body: F) -> Vec<Result<T>>
where
    T: Send,
    F: Fn(&ChannelComm) -> Result<T> + Sync,
{
    let body = &body;
    std::thread::scope(|scope| {
        let handles: Vec<_> = ChannelComm::group(size)
            .into_iter()
            .map(|comm| {
                scope.spawn(move || {
                    let outcome = body(&comm);
                    if let Err(e) = &outcome {
                        if !matches!(e, Error::Aborted { .. } | Error::Disconnected(_)) {
                            comm.abort(&e.to_string());
                        }
                    }
                    outcome
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(Error::Aborted {
                        rank,
                        reason: "rank panicked".into(),
                    })
                })
            })
            .collect()
    })
}
