//! Channel wiring between the sequencer, transport and presentation tasks

use tokio::sync::{mpsc, oneshot};

use crate::config::ChannelConfig;
use crate::messages::{AppEvent, Command, Effect, Event};

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;
pub type EffectSender = mpsc::Sender<Effect>;
pub type EffectReceiver = mpsc::Receiver<Effect>;
pub type AppEventSender = mpsc::Sender<AppEvent>;
pub type AppEventReceiver = mpsc::Receiver<AppEvent>;

/// Responder used by commands that answer the caller directly
pub type Responder<T> = oneshot::Sender<T>;

pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    mpsc::channel(config.command_buffer_size)
}

pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    mpsc::channel(config.event_buffer_size)
}

pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    mpsc::channel(config.effect_buffer_size)
}

pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    mpsc::channel(config.app_event_buffer_size)
}

// ----------------------------------------------------------------------------
// Transport Link
// ----------------------------------------------------------------------------

/// The transport task's ends of the channel pair
///
/// Handed to whichever transport implementation backs the session: it sends
/// `Event`s in and receives `Effect`s out. Tests script a fake transport by
/// holding one of these directly.
#[derive(Debug)]
pub struct TransportLink {
    pub event_sender: EventSender,
    pub effect_receiver: EffectReceiver,
}

impl TransportLink {
    pub fn new(event_sender: EventSender, effect_receiver: EffectReceiver) -> Self {
        Self {
            event_sender,
            effect_receiver,
        }
    }
}
