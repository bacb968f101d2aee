use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use std::thread;
use std::time::{Duration, Instant};
use tether_agent::TetherAgentOptionsBuilder;

use tether_relative_pose::streamer_config::load_config_from_file;
use tether_relative_pose::study_config::warn_if_invalid;
use tether_relative_pose::systems::{Systems, TickOutcome};
use tether_relative_pose::tether_interface::{
    handle_rigid_bodies_message, handle_roster_message, handle_save_message,
    handle_send_study_message, handle_target_change, publish_status, Inputs, Outputs,
    TetherTransport,
};

mod cli;
use cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Initialize the logger from the environment

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level))
        .filter_module("paho_mqtt", log::LevelFilter::Warn)
        .filter_module("tether_agent", log::LevelFilter::Warn)
        .init();

    debug!("Started; args: {:?}", cli);

    let mut tether_agent = TetherAgentOptionsBuilder::new(&cli.agent_role)
        .id(Some(&cli.agent_group))
        .host(Some(&cli.tether_host.to_string()))
        .username(cli.tether_username.as_deref())
        .password(cli.tether_password.as_deref())
        .build()
        .expect("failed to init and/or connect Tether Agent");

    let inputs = Inputs::new(&mut tether_agent);
    let outputs = Outputs::new(&mut tether_agent);

    let mut config = load_config_from_file(&cli.config_path).expect("failed to load config");
    info!("Loaded config OK; publish with retain=true");
    match config.study.as_ref() {
        Some(study) => warn_if_invalid(study),
        None => warn!("No study configuration defined; study setup cannot be sent"),
    }

    // Always publish on first start/load...
    let payload = rmp_serde::to_vec_named(&config).expect("failed to serialize config");
    tether_agent
        .send(&outputs.config_output, Some(&payload))
        .expect("failed to publish config");

    let mut systems = Systems::new(&config);
    let mut transport = TetherTransport::new(tether_agent);

    publish_status(
        transport.agent(),
        &outputs.status_output,
        "Waiting for HMD connection...",
    );

    loop {
        let mut work_done = false;

        if let Some((topic, payload)) = transport.agent_mut().check_messages() {
            work_done = true;

            if inputs.rigid_bodies_input.matches(&topic) {
                handle_rigid_bodies_message(&payload, &mut systems, Instant::now());
            }

            if inputs.roster_input.matches(&topic) {
                if let Some(change) = handle_roster_message(&payload, &mut systems) {
                    handle_target_change(&change, &mut transport, &outputs);
                }
            }

            if inputs.save_config_input.matches(&topic) {
                if let Err(e) = handle_save_message(
                    &payload,
                    &mut config,
                    &mut systems,
                    &mut transport,
                    &outputs,
                    &cli.config_path,
                ) {
                    error!("Failed to save and apply remote config: {}", e);
                }
            }

            if inputs.send_study_input.matches(&topic) {
                let status = handle_send_study_message(&mut config, &systems, &mut transport);
                publish_status(transport.agent(), &outputs.status_output, &status);
            }
        }

        match systems.tick(Instant::now(), &mut transport) {
            Ok(TickOutcome::NotDue) | Ok(TickOutcome::NoTarget) => {}
            Ok(outcome) => {
                work_done = true;
                debug!("Tick: {:?}", outcome);
            }
            Err(e) => {
                work_done = true;
                error!("Failed to send relative transform: {}", e);
            }
        }

        if !work_done {
            thread::sleep(Duration::from_millis(1));
        }
    }
}
