use super::Status;
use crate::client::{AuthenticatedClient, ClientError, UploadApi, WatchlistApi};
use crate::types::{IndexWatchlistCreate, StockAdd, Watchlist, WatchlistCreate, WatchlistUpdate};

pub struct WatchlistState {
    api: WatchlistApi,
    upload: UploadApi,
    pub watchlists: Vec<Watchlist>,
    pub current: Option<Watchlist>,
    pub status: Status,
}

impl WatchlistState {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self {
            api: WatchlistApi::new(client.clone()),
            upload: UploadApi::new(client),
            watchlists: Vec::new(),
            current: None,
            status: Status::default(),
        }
    }

    pub async fn fetch_all(&mut self) -> Result<(), ClientError> {
        let api = &self.api;
        self.watchlists = self.status.track(api.list()).await?;
        Ok(())
    }

    pub async fn fetch_one(&mut self, id: &str) -> Result<Watchlist, ClientError> {
        let api = &self.api;
        let watchlist = self.status.track(api.get(id)).await?;
        self.replace(watchlist.clone());
        self.current = Some(watchlist.clone());
        Ok(watchlist)
    }

    pub async fn create(&mut self, req: &WatchlistCreate) -> Result<Watchlist, ClientError> {
        let api = &self.api;
        let watchlist = self.status.track(api.create(req)).await?;
        self.watchlists.push(watchlist.clone());
        Ok(watchlist)
    }

    pub async fn update(
        &mut self,
        id: &str,
        req: &WatchlistUpdate,
    ) -> Result<Watchlist, ClientError> {
        let api = &self.api;
        let watchlist = self.status.track(api.update(id, req)).await?;
        self.replace(watchlist.clone());
        Ok(watchlist)
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ClientError> {
        let api = &self.api;
        self.status.track(api.delete(id)).await?;
        self.watchlists.retain(|w| w.id != id);
        if self.current.as_ref().is_some_and(|w| w.id == id) {
            self.current = None;
        }
        Ok(())
    }

    pub async fn add_stock(&mut self, id: &str, stock: &StockAdd) -> Result<Watchlist, ClientError> {
        let api = &self.api;
        let watchlist = self.status.track(api.add_stock(id, stock)).await?;
        self.replace(watchlist.clone());
        Ok(watchlist)
    }

    pub async fn remove_stock(&mut self, id: &str, symbol: &str) -> Result<Watchlist, ClientError> {
        let api = &self.api;
        let watchlist = self.status.track(api.remove_stock(id, symbol)).await?;
        self.replace(watchlist.clone());
        Ok(watchlist)
    }

    pub async fn create_from_index(
        &mut self,
        index_name: &str,
        watchlist_name: Option<&str>,
    ) -> Result<Watchlist, ClientError> {
        let req = IndexWatchlistCreate {
            index_name: index_name.to_string(),
            watchlist_name: watchlist_name.map(str::to_string),
        };
        let api = &self.api;
        let watchlist = self.status.track(api.create_from_index(&req)).await?;
        self.watchlists.push(watchlist.clone());
        Ok(watchlist)
    }

    pub async fn upload_spreadsheet(
        &mut self,
        filename: &str,
        bytes: Vec<u8>,
        watchlist_name: Option<&str>,
    ) -> Result<Watchlist, ClientError> {
        let upload = &self.upload;
        let watchlist = self
            .status
            .track(upload.upload_spreadsheet(filename, bytes, watchlist_name))
            .await?;
        self.watchlists.push(watchlist.clone());
        Ok(watchlist)
    }

    pub async fn append_spreadsheet(
        &mut self,
        id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Watchlist, ClientError> {
        let upload = &self.upload;
        let watchlist = self
            .status
            .track(upload.append_spreadsheet(id, filename, bytes))
            .await?;
        self.replace(watchlist.clone());
        Ok(watchlist)
    }

    /// Make an already loaded list current. Returns false for unknown ids.
    pub fn select(&mut self, id: &str) -> bool {
        self.current = self.watchlists.iter().find(|w| w.id == id).cloned();
        self.current.is_some()
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Swap the held copy (list entry and `current`) for a fresher one.
    fn replace(&mut self, watchlist: Watchlist) {
        if let Some(current) = self.current.as_mut().filter(|c| c.id == watchlist.id) {
            *current = watchlist.clone();
        }
        match self.watchlists.iter_mut().find(|w| w.id == watchlist.id) {
            Some(held) => *held = watchlist,
            None => self.watchlists.push(watchlist),
        }
    }
}
