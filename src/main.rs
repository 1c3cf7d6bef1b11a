use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use party_music::{
    audio::{lavalink_client::LavalinkClient, lavalink_socket::LavalinkSocket},
    bot::{events::NodeEventDispatcher, gateway::SongbirdGateway, PartyMusicBot},
    Config, MusicController,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("party_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Party Music v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Lavalink necesita el id del bot antes de abrir el websocket
    let user_id = Http::new(&config.discord_token)
        .get_current_user()
        .await?
        .id;

    // Songbird solo negocia la voz; el audio lo manda Lavalink
    let songbird = Songbird::serenity();
    let voice = Arc::new(SongbirdGateway::new(songbird.clone()));

    info!("🎼 Inicializando Lavalink...");
    let lavalink = Arc::new(LavalinkClient::new(&config, voice)?);

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(LavalinkSocket::new(&config, user_id).run(lavalink.clone(), events_tx));

    let controller = Arc::new(MusicController::new(lavalink, config.session_settings()));
    tokio::spawn(NodeEventDispatcher::new(controller.clone(), events_rx).run());

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(PartyMusicBot::new(controller.clone()))
        .register_songbird_with(songbird)
        .await?;

    {
        let mut data = client.data.write().await;
        data.insert::<MusicController>(controller);
    }

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Señal de shutdown recibida, cerrando...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Error al registrar Ctrl+C: {:?}", e),
        }
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
