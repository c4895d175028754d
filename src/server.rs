use std::net::SocketAddr;

use anyhow::{anyhow, Context, Result};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::controller::Request;
use crate::protocol::EffectCodec;

/// Accepts `set_effect` calls over TCP and forwards them to the effect controller.
pub struct EffectServer {
    listener: TcpListener,
}

impl EffectServer {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<EffectServer> {
        let listener = TcpListener::bind(addr)
            .await
            .context("Error binding effect request listener")?;

        Ok(EffectServer { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self, requests: mpsc::Sender<Request>) -> Result<()> {
        log::info!("Listening for effect requests on {}", self.local_addr()?);

        loop {
            let (socket, peer) = self
                .listener
                .accept()
                .await
                .context("Error accepting connection")?;

            log::debug!("Accepted connection from {}", peer);

            let requests = requests.clone();
            tokio::spawn(async move {
                match handle(socket, requests).await {
                    Ok(()) => log::debug!("Connection from {} closed", peer),
                    Err(e) => log::error!("Error serving {}: {:#}", peer, e),
                }
            });
        }
    }
}

async fn handle(socket: TcpStream, requests: mpsc::Sender<Request>) -> Result<()> {
    let mut framed = Framed::new(socket, EffectCodec::new());

    while let Some(request) = framed.next().await {
        let request = request.context("Error while reading effect request")?;
        log::trace!("Received {:?}", request);

        let (reply, response) = oneshot::channel();
        requests
            .send((request, reply))
            .await
            .map_err(|_| anyhow!("Effect controller is not running"))?;

        let response = response
            .await
            .context("Effect controller dropped the request")?;

        framed.send(response).await?;
    }

    Ok(())
}
