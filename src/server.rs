use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, error, info, warn};

use crate::thread_pool::ThreadPool;
use crate::{KvMessage, KvsEngine, KvsError, Result};

/// A TCP socket server over a key value engine.
///
/// It accepts connections on a [`SocketAddr`] and hands each one to a [`ThreadPool`] as a
/// single job. The job reads one request [`KvMessage`], runs it against the engine, writes one
/// response and closes the connection.
///
/// # Example
/// Create and run a server listening on "127.0.0.1:4000", with 4 threads running on a shared
/// queue thread pool, serving a cache of 100 sets of 10 entries
/// ```rust
/// use kvcache::{KvServer, SocketServer};
/// use kvcache::thread_pool::{SharedQueueThreadPool, ThreadPool};
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let pool = SharedQueueThreadPool::new(4)?;
/// let engine = KvServer::new(100, 10);
/// let server = SocketServer::bind("127.0.0.1:4000", engine, pool)?;
/// // server.run()?;
/// #
/// # Ok(())
/// # }
/// ```
pub struct SocketServer<E: KvsEngine, P: ThreadPool> {
    /// the kvs engine to use
    engine: E,
    /// a pool of threads that will perform work using a handle to the engine
    pool: P,
    listener: TcpListener,
}

impl<E: KvsEngine, P: ThreadPool> SocketServer<E, P> {
    /// binds a listener to `addr`. Connections are not accepted until [`SocketServer::run`]
    ///
    /// # Errors
    /// returns [`KvsError::Io`] if the address cannot be bound
    pub fn bind<A: ToSocketAddrs>(addr: A, engine: E, pool: P) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(SocketServer {
            engine,
            pool,
            listener,
        })
    }

    /// the address the server is listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// accepts connections forever. Each connection is serviced by a job on the thread pool,
    /// so a slow client never blocks the accept loop
    pub fn run(self) -> Result<()> {
        info!("accepting connections on {}", self.local_addr()?);
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let engine = self.engine.clone();
                    self.pool.spawn(move || serve(&engine, stream));
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }
        Ok(())
    }
}

/// Services one connection: reads a request, runs it in the engine, answers with a response
/// and closes the connection.
///
/// An undecodable request is answered with an `InvalidFormat` response. Sending the response
/// is best-effort: a write failure is logged and otherwise ignored, since the request has
/// already been applied.
fn serve<E: KvsEngine>(engine: &E, mut stream: TcpStream) {
    let peer_addr = stream
        .peer_addr()
        .map_or_else(|_| "unknown peer".to_string(), |addr| addr.to_string());
    let response = match KvMessage::read_from(&mut stream) {
        Ok(request) => {
            debug!("Receive request from {}: {:?}", peer_addr, request);
            dispatch(engine, request)
        }
        Err(e) => {
            warn!("Unreadable request from {}: {}", peer_addr, e);
            e.to_response()
        }
    };

    match response.write_to(&mut stream) {
        Ok(()) => debug!("Response sent to {}: {:?}", peer_addr, response),
        Err(e) => warn!("Could not send response to {}: {}", peer_addr, e),
    }
    if let Err(e) = stream.shutdown(Shutdown::Both) {
        debug!("Closing connection to {} failed: {}", peer_addr, e);
    }
}

/// runs `request` against `engine` and builds the response for it
pub(crate) fn dispatch<E: KvsEngine>(engine: &E, request: KvMessage) -> KvMessage {
    let result = match request {
        KvMessage::PutRequest { key, value } => engine.put(key, value).map(|_| KvMessage::success()),
        KvMessage::GetRequest { key } => engine
            .get(&key)
            .map(|value| KvMessage::found(key, value)),
        KvMessage::DelRequest { key } => engine.del(&key).map(|_| KvMessage::success()),
        KvMessage::Response { .. } => Err(KvsError::InvalidFormat),
    };
    result.unwrap_or_else(|e| e.to_response())
}
