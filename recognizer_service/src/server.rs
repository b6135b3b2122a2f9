use crate::{
    classifier::{Classifier, ParityClassifier},
    config::{Compression, Config, ServerConfig},
    recognizer::Recognizer,
    service::RecognizerService,
};
use recognizer_proto::image_recognizer_server::{ImageRecognizerServer, SERVICE_NAME};
use futures::StreamExt;
use std::future::Future;
use tokio::{net::TcpListener, signal};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic_health::{server::HealthReporter, ServingStatus};

pub struct GrpcServer {
    router: Router,
    health_reporter: HealthReporter,
    addr: String,
}

impl GrpcServer {
    pub fn new<C: Classifier>(
        recognizer: Recognizer<C>,
        config: &ServerConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let recognizer_service = ImageRecognizerServer::new(RecognizerService::new(recognizer))
            .max_decoding_message_size(config.max_message_size)
            .max_encoding_message_size(config.max_message_size);
        let recognizer_service = match config.compression {
            Compression::Gzip => recognizer_service
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
            Compression::None => recognizer_service,
        };

        let (health_reporter, health_service) = tonic_health::server::health_reporter();
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(recognizer_proto::FILE_DESCRIPTOR_SET)
            .build_v1alpha()?;

        let router = Server::builder()
            .tcp_nodelay(true)
            .add_service(health_service)
            .add_service(recognizer_service)
            .add_service(reflection_service);

        Ok(Self {
            router,
            health_reporter,
            addr: config.get_address(),
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = self.addr.parse()?;
        self.health_reporter
            .set_service_status(SERVICE_NAME, ServingStatus::Serving)
            .await;

        tracing::info!("Recognizer service listening on {}", self.addr);

        let shutdown = async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown")
        };

        self.router.serve_with_shutdown(addr, shutdown).await?;
        Ok(())
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    pub async fn run_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()>,
    {
        self.health_reporter
            .set_service_status(SERVICE_NAME, ServingStatus::Serving)
            .await;

        tracing::info!("Recognizer service listening on {}", listener.local_addr()?);

        // Builder socket options only apply to listeners the router binds itself.
        let incoming = TcpListenerStream::new(listener).map(|stream| {
            let stream = stream?;
            stream.set_nodelay(true)?;
            Ok::<_, std::io::Error>(stream)
        });

        self.router
            .serve_with_incoming_shutdown(incoming, shutdown)
            .await?;
        Ok(())
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let classifier = ParityClassifier::new(config.recognizer.get_processing_delay());
    let recognizer = Recognizer::new(classifier, &config.recognizer);

    let grpc_server = GrpcServer::new(recognizer, &config.server)?;
    grpc_server.run().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
