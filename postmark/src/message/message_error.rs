/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

/// Errors surfaced by the bus itself.
///
/// Routing failures are never reported to senders; these only cover construction,
/// configuration and use of a bus whose router has stopped.
#[derive(Debug)]
pub enum BusError {
    /// The router thread or its runtime could not be started.
    Io(String),
    /// The router is no longer accepting messages.
    ShutDown,
    /// A configuration file could not be parsed.
    Config(String),
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusError::Io(msg) => write!(f, "I/O error: {msg}"),
            BusError::ShutDown => write!(f, "Message bus has been shut down"),
            BusError::Config(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for BusError {}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        BusError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for BusError {
    fn from(err: toml::de::Error) -> Self {
        BusError::Config(err.to_string())
    }
}

/// The router's intake channel is closed once it stops.
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for BusError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        BusError::ShutDown
    }
}
