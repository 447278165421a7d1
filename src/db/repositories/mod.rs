mod kv;
mod sessions;
