mod cluster;
mod helpers;
mod iterate;
