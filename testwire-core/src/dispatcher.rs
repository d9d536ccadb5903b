// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The producer/consumer boundary of the pipeline.
//!
//! Line splitting and directive recognition are cheap and run wherever
//! the producer happens to be (typically the thread reading the external
//! process, which may block on I/O). All state mutation happens on a
//! single consumer: the [`Dispatcher`] drains an order-preserving channel
//! of [`WireEvent`]s and is the sole caller into the
//! [`EventConverter`]. Events are applied in exactly the order they were
//! recognized; suite and test resolution depends on it.

use crate::{
    config::ProcessorConfig,
    converter::EventConverter,
    reporter::Reporter,
    wire::{EventRecognizer, WireEvent},
};
use testwire_protocol::OutputChannel;
use tokio::sync::mpsc;
use tracing::debug;

/// Default capacity of the producer-to-consumer event queue. The queue is
/// bounded so a producer that outruns the consumer blocks instead of
/// growing the heap without limit.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// The producer half: feed raw stream fragments in, from whichever thread
/// reads the external process.
pub struct StreamInput {
    recognizer: EventRecognizer,
    sender: mpsc::Sender<WireEvent>,
}

impl StreamInput {
    /// Feeds one fragment of process output. Blocks if the consumer is
    /// more than a queue's worth of events behind. Must not be called
    /// from an async context; the producer is expected to be a plain
    /// thread.
    pub fn write(&mut self, fragment: &str, channel: OutputChannel) {
        let sender = &self.sender;
        self.recognizer
            .process(fragment, channel, |event| send_ordered(sender, event));
    }

    /// Flushes buffered partial lines and closes the queue. The
    /// dispatcher then performs its end-of-run handling: dropping the
    /// input without further ceremony is exactly what a killed producer
    /// looks like, and is handled the same way.
    pub fn finish(self) {
        let Self {
            mut recognizer,
            sender,
        } = self;
        recognizer.flush(|event| send_ordered(&sender, event));
    }
}

fn send_ordered(sender: &mpsc::Sender<WireEvent>, event: WireEvent) {
    if sender.blocking_send(event).is_err() {
        debug!("consumer is gone, dropping recognized event");
    }
}

/// The consumer half: drains the queue and owns all mutable state.
pub struct Dispatcher {
    converter: EventConverter,
    receiver: mpsc::Receiver<WireEvent>,
}

impl Dispatcher {
    /// The converter, e.g. for registering a locator before the run.
    pub fn converter_mut(&mut self) -> &mut EventConverter {
        &mut self.converter
    }

    /// Runs to completion: starts the run, applies every event in arrival
    /// order, and finishes (or terminates) the run when the input side is
    /// dropped. Returns the converter so the finished tree can be
    /// inspected.
    pub async fn run(mut self) -> EventConverter {
        self.converter.on_testing_started();
        while let Some(event) = self.receiver.recv().await {
            self.converter.apply(event);
        }
        self.converter.finish_testing();
        self.converter
    }
}

/// Creates a connected producer/consumer pair with the default queue
/// capacity.
pub fn pipeline(config: ProcessorConfig, reporter: Reporter) -> (StreamInput, Dispatcher) {
    pipeline_with_capacity(config, reporter, DEFAULT_EVENT_QUEUE_CAPACITY)
}

/// Creates a connected producer/consumer pair with an explicit queue
/// capacity.
pub fn pipeline_with_capacity(
    config: ProcessorConfig,
    reporter: Reporter,
    capacity: usize,
) -> (StreamInput, Dispatcher) {
    let (sender, receiver) = mpsc::channel(capacity);
    let recognizer = EventRecognizer::new(&config);
    let converter = EventConverter::new(config, reporter);
    (
        StreamInput { recognizer, sender },
        Dispatcher {
            converter,
            receiver,
        },
    )
}
