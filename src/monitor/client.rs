use super::*;

/// 已接入客户端的登记表：accept 时登记，断开或读写出错时注销
#[derive(Clone)]
pub struct ClientTracker {
    clients: Arc<DashMap<u64, ClientInfo>>,
    next_id: Arc<AtomicU64>,
}

impl ClientTracker {
    pub fn new() -> Self {
        ClientTracker {
            clients: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn add_client(&self, addr: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.clients.insert(
            id,
            ClientInfo {
                addr,
                connect_time: Instant::now(),
            },
        );
        id
    }

    pub fn remove_client(&self, id: u64) -> Option<ClientInfo> {
        self.clients.remove(&id).map(|(_, info)| info)
    }

    pub fn connected(&self) -> usize {
        self.clients.len()
    }
}

impl Default for ClientTracker {
    fn default() -> Self {
        Self::new()
    }
}
