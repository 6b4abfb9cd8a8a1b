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

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use postmark::prelude::*;
use postmark_test::prelude::*;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::setup::initialize_tracing;
use crate::setup::messages::Ping;

mod setup;

#[postmark_test]
async fn test_load_from_file_overrides_defaults() -> anyhow::Result<()> {
    initialize_tracing();
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[router]
thread_name = "bus-under-test"

[transport]
segment_size = 512
retransmit_timeout_ms = 250
"#
    )?;

    let config = BusConfig::load_from(file.path())?;
    assert_eq!(config.router.thread_name, "bus-under-test");
    assert_eq!(config.router.intake_warning_depth, RouterConfig::default().intake_warning_depth);
    assert_eq!(config.transport.segment_size, 512);
    assert_eq!(config.transport.retransmit_timeout(), Duration::from_millis(250));
    assert_eq!(config.transport.max_in_flight_segments, TransportConfig::default().max_in_flight_segments);
    Ok(())
}

#[postmark_test]
async fn test_load_from_reports_missing_and_malformed_files() -> anyhow::Result<()> {
    initialize_tracing();
    let directory = tempfile::tempdir()?;
    let missing = BusConfig::load_from(directory.path().join("absent.toml"));
    assert!(matches!(missing, Err(BusError::Io(_))));

    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[router]\nthread_name = 42")?;
    assert!(matches!(BusConfig::load_from(file.path()), Err(BusError::Config(_))));
    Ok(())
}

#[postmark_test]
async fn test_router_thread_uses_configured_name() -> anyhow::Result<()> {
    initialize_tracing();
    let config = BusConfig::from_toml_str("[router]\nthread_name = \"named-router\"\n")?;
    let bus = MessageBus::new(config)?;
    assert_eq!(bus.config().router.thread_name, "named-router");

    let (tx, mut names) = mpsc::unbounded_channel();
    let address = MessageAddress::new();
    bus.register(
        address,
        Arc::new(move |_: &MessageContextRef| {
            let _ = tx.send(std::thread::current().name().map(str::to_owned));
        }),
    );
    bus.send(Ping(1), None, &[address], Duration::ZERO, None, &MessageAddress::new());

    let name = timeout(Duration::from_secs(5), names.recv()).await?;
    assert_eq!(name, Some(Some("named-router".to_owned())));
    Ok(())
}
