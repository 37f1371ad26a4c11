//! Command sequencing between networked participants.
//!
//! Transport is someone else's job. This module only keeps the contract:
//! a client never applies its own commands directly. It sends them to the
//! server, and applies them when the server hands them back in its
//! authoritative order, at the tick the server chose.

use crate::command::{Command, CommandCallback, CommandResult, CommandSource};
use crate::company::Actor;
use crate::state::WorldState;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkMode {
    /// Single player; everything runs locally.
    #[default]
    Offline,
    /// Runs commands and publishes them for the clients.
    Server,
    /// Sends commands to the server and runs only what comes back.
    Client,
}

/// A command on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPacket {
    /// Tick at which every participant executes the command.
    pub frame: u64,
    pub actor: Actor,
    pub command: Command,
    /// The command was issued on this machine.
    #[serde(skip)]
    pub my_cmd: bool,
    #[serde(skip)]
    pub callback: Option<CommandCallback>,
}

impl CommandPacket {
    pub fn new(actor: Actor, command: Command, callback: Option<CommandCallback>) -> Self {
        Self {
            frame: 0,
            actor,
            command,
            my_cmd: true,
            callback,
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandQueue {
    mode: NetworkMode,
    /// Commands this client has issued and not yet seen come back.
    awaiting_echo: Vec<CommandPacket>,
    /// Wire copies of issued commands not yet handed to the transport.
    unsent: Vec<CommandPacket>,
    /// Sequenced commands waiting for their frame, in server order.
    incoming: VecDeque<CommandPacket>,
    /// Commands the server executed, for distribution to clients.
    broadcast: Vec<CommandPacket>,
}

impl CommandQueue {
    pub fn new(mode: NetworkMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> NetworkMode {
        self.mode
    }

    /// Queue a locally issued command for the server.
    pub fn send(&mut self, packet: CommandPacket) {
        log::trace!("sending {:?} to server", packet.command.kind());
        self.unsent.push(CommandPacket {
            callback: None,
            ..packet.clone()
        });
        self.awaiting_echo.push(packet);
    }

    /// Packets issued since the last call, for the server. Callbacks stay
    /// behind and are reattached when the echo arrives.
    pub fn take_outgoing(&mut self) -> Vec<CommandPacket> {
        std::mem::take(&mut self.unsent)
    }

    /// Record a command the server has just executed at `frame`.
    pub fn broadcast(&mut self, mut packet: CommandPacket, frame: u64) {
        packet.frame = frame;
        packet.my_cmd = false;
        self.broadcast.push(packet);
    }

    pub fn take_broadcast(&mut self) -> Vec<CommandPacket> {
        std::mem::take(&mut self.broadcast)
    }

    /// Accept a sequenced packet from the server. Packets must arrive in
    /// the server's order. An echo of one of our own commands picks up its
    /// callback again.
    pub fn receive(&mut self, mut packet: CommandPacket) {
        debug_assert!(
            self.incoming.back().map_or(true, |last| last.frame <= packet.frame),
            "server packets out of order"
        );
        if let Some(i) = self
            .awaiting_echo
            .iter()
            .position(|p| p.actor == packet.actor && p.command == packet.command)
        {
            let mine = self.awaiting_echo.remove(i);
            packet.my_cmd = true;
            packet.callback = mine.callback;
        } else {
            packet.my_cmd = false;
            packet.callback = None;
        }
        self.incoming.push_back(packet);
    }

    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    /// Execute every received packet due at or before `state.tick`, in
    /// order. Returns the results.
    pub fn replay(&mut self, state: &mut WorldState) -> Vec<CommandResult> {
        let mut results = Vec::new();
        while self.incoming.front().is_some_and(|p| p.frame <= state.tick) {
            let Some(packet) = self.incoming.pop_front() else {
                break;
            };
            let callback = packet.callback.filter(|_| packet.my_cmd);
            let result = packet.command.execp(
                state,
                self,
                packet.actor,
                CommandSource::Network,
                callback,
            );
            results.push(result);
        }
        results
    }
}
