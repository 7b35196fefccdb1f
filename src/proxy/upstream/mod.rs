// 上游客户端

pub mod client;
